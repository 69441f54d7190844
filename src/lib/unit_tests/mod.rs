// SPDX-License-Identifier: Apache-2.0

mod emit;
mod keyfile;
mod parse;
mod render;
mod resolve;

use std::path::Path;

use crate::{NetplanState, Parser};

/// Feed an inline YAML document to a parser under a synthetic file
/// name.
pub(crate) fn load_str(
    parser: &mut Parser,
    name: &str,
    yaml: &str,
) -> Result<(), crate::NplanError> {
    parser.load_yaml_from_reader(Path::new(name), yaml.as_bytes())
}

/// Parse one document into a fresh validated state.
pub(crate) fn state_from_yaml(yaml: &str) -> NetplanState {
    let mut parser = Parser::new();
    load_str(&mut parser, "test.yaml", yaml).unwrap();
    let mut state = NetplanState::new();
    state.import_parser_results(&mut parser).unwrap();
    state
}
