//! Language profile registry
//!
//! Each supported language is described by a static [`LanguageProfile`]: the
//! name of the source file inside a job directory, the pinned container image,
//! and the command steps for the container and local backends. Steps are
//! argument vectors; `{source}` and `{workdir}` placeholders are replaced per
//! argument, so submitted code never reaches a shell.

mod java;
mod javascript;
mod python;

use which::which;

use crate::{error::Error, types::Language, Result};

const SOURCE_PLACEHOLDER: &str = "{source}";
const WORKDIR_PLACEHOLDER: &str = "{workdir}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Compile,
    Run,
}

/// One program invocation of a language pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandTemplate {
    pub kind: StepKind,
    pub program: &'static str,
    pub args: &'static [&'static str],
}

impl CommandTemplate {
    pub const fn compile(program: &'static str, args: &'static [&'static str]) -> Self {
        Self {
            kind: StepKind::Compile,
            program,
            args,
        }
    }

    pub const fn run(program: &'static str, args: &'static [&'static str]) -> Self {
        Self {
            kind: StepKind::Run,
            program,
            args,
        }
    }

    /// Substitute placeholders, yielding the final argument vector
    pub fn render_args(&self, source: &str, workdir: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                arg.replace(SOURCE_PLACEHOLDER, source)
                    .replace(WORKDIR_PLACEHOLDER, workdir)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageProfile {
    pub language: Language,
    /// File name of the submitted source inside the job directory
    pub source_file: &'static str,
    /// Default container image, overridable through configuration
    pub image: &'static str,
    pub container_steps: &'static [CommandTemplate],
    pub local_steps: &'static [CommandTemplate],
}

impl LanguageProfile {
    /// Host binaries the local backend needs
    pub fn required_tools(&self) -> Vec<&'static str> {
        let mut tools: Vec<_> = self.local_steps.iter().map(|step| step.program).collect();
        tools.dedup();
        tools
    }

    /// Whether the local backend can run this language on this host
    pub fn check_local_tools(&self) -> Result<()> {
        let missing: Vec<_> = self
            .required_tools()
            .into_iter()
            .filter(|tool| which(tool).is_err())
            .collect();

        if !missing.is_empty() {
            return Err(Error::System(format!(
                "Missing required tools: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }
}

static PROFILES: [LanguageProfile; 3] = [javascript::PROFILE, python::PROFILE, java::PROFILE];

/// Look up the profile for a client-supplied language identifier
pub fn resolve(language: &str) -> Result<&'static LanguageProfile> {
    let language: Language = language.parse()?;
    Ok(profile(language))
}

pub fn profile(language: Language) -> &'static LanguageProfile {
    // every Language variant has exactly one entry
    PROFILES
        .iter()
        .find(|profile| profile.language == language)
        .unwrap_or_else(|| unreachable!("no profile registered for {}", language))
}

pub fn profiles() -> &'static [LanguageProfile] {
    &PROFILES
}

#[cfg(test)]
pub(crate) fn skip_if_not_available(tools: &[&str]) -> bool {
    let missing: Vec<_> = tools
        .iter()
        .filter(|tool| which(**tool).is_err())
        .map(|s| (*s).to_string())
        .collect();

    if !missing.is_empty() {
        eprintln!("Skipping test: {} not available", missing.join(", "));
        return true;
    }
    false
}
