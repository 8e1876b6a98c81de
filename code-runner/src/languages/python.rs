use super::{CommandTemplate, LanguageProfile};
use crate::types::Language;

pub(super) const PROFILE: LanguageProfile = LanguageProfile {
    language: Language::Python,
    source_file: "main.py",
    image: "python:3.11",
    container_steps: &[CommandTemplate::run("python", &["-u", "{source}"])],
    local_steps: &[CommandTemplate::run("python3", &["-u", "{source}"])],
};
