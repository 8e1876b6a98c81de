use super::{CommandTemplate, LanguageProfile};
use crate::types::Language;

/// Submissions declare `public class Main`; the class files land next to the
/// source in the job directory.
pub(super) const PROFILE: LanguageProfile = LanguageProfile {
    language: Language::Java,
    source_file: "Main.java",
    image: "openjdk:17",
    container_steps: &[
        CommandTemplate::compile("javac", &["-d", "{workdir}", "{source}"]),
        CommandTemplate::run("java", &["-cp", "{workdir}", "Main"]),
    ],
    local_steps: &[
        CommandTemplate::compile("javac", &["-d", "{workdir}", "{source}"]),
        CommandTemplate::run("java", &["-cp", "{workdir}", "Main"]),
    ],
};
