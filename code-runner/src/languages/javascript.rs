use super::{CommandTemplate, LanguageProfile};
use crate::types::Language;

pub(super) const PROFILE: LanguageProfile = LanguageProfile {
    language: Language::JavaScript,
    source_file: "main.js",
    image: "node:18",
    container_steps: &[CommandTemplate::run("node", &["{source}"])],
    local_steps: &[CommandTemplate::run("node", &["{source}"])],
};
