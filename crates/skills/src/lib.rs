//! Skill-document ingestion.
//!
//! A skill is a directory holding a `SKILL.md` whose YAML front matter names
//! it and declares what it needs:
//!
//! ```text
//! ---
//! name: email
//! description: Send email through SMTP
//! metadata:
//!   openclaw:
//!     env: ["SMTP_HOST=smtp.example.com"]
//!     bins: ["python3"]
//! ---
//! Usage notes for the model...
//! ```
//!
//! The whole document is rendered into the system prompt so the model can
//! drive the skill through the shell tool.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const SKILL_FILE: &str = "SKILL.md";

const CONTEXT_HEADER: &str =
    "You have access to the following external skills (installed locally):\n\n";

#[derive(Debug, Error)]
pub enum SkillError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} has no front matter")]
    MissingFrontMatter(PathBuf),

    #[error("Invalid front matter in {path}: {source}")]
    InvalidFrontMatter {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Default, Deserialize)]
struct FrontMatter {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Debug, Default, Deserialize)]
struct Metadata {
    #[serde(default)]
    openclaw: Requirements,
    /// Older documents use this key.
    #[serde(default)]
    clawdbot: Requirements,
}

#[derive(Debug, Default, Deserialize)]
struct Requirements {
    #[serde(default)]
    env: Vec<String>,
    #[serde(default)]
    bins: Vec<String>,
}

/// One loaded skill.
#[derive(Debug, Clone)]
pub struct Skill {
    pub name: String,
    pub description: String,
    /// Skill directory
    pub path: PathBuf,
    /// Full `SKILL.md` text
    pub document: String,
    pub env: Vec<(String, String)>,
    pub bins: Vec<String>,
    /// Required binaries not found on `PATH` at load time
    pub missing_bins: Vec<String>,
}

impl Skill {
    /// Parse a `SKILL.md` document located in `dir`.
    pub fn parse(dir: &Path, document: &str) -> Result<Self, SkillError> {
        let file = dir.join(SKILL_FILE);
        let yaml = front_matter(document).ok_or_else(|| SkillError::MissingFrontMatter(file.clone()))?;
        let front: FrontMatter = if yaml.trim().is_empty() {
            FrontMatter::default()
        } else {
            serde_yaml::from_str(yaml)
                .map_err(|source| SkillError::InvalidFrontMatter { path: file, source })?
        };

        let name = if front.name.trim().is_empty() {
            dir.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        } else {
            front.name.trim().to_string()
        };

        let Metadata { openclaw, clawdbot } = front.metadata;
        let env = if openclaw.env.is_empty() { clawdbot.env } else { openclaw.env };
        let bins = if openclaw.bins.is_empty() { clawdbot.bins } else { openclaw.bins };

        let env = env
            .iter()
            .filter_map(|entry| match entry.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    Some((key.trim().to_string(), value.to_string()))
                }
                _ => {
                    warn!(skill = %name, entry = %entry, "Ignoring env entry without KEY=VALUE");
                    None
                }
            })
            .collect();

        let missing_bins = bins.iter().filter(|b| !on_path(b)).cloned().collect();

        Ok(Self {
            name,
            description: front.description.trim().to_string(),
            path: dir.to_path_buf(),
            document: document.to_string(),
            env,
            bins,
            missing_bins,
        })
    }
}

/// The YAML between the opening `---` and the next `---` line.
fn front_matter(document: &str) -> Option<&str> {
    let rest = document.trim_start_matches('\u{feff}').strip_prefix("---")?;
    let rest = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))?;
    if rest.starts_with("---") {
        return Some("");
    }
    rest.find("\n---").map(|end| &rest[..end])
}

fn on_path(bin: &str) -> bool {
    let candidate = Path::new(bin);
    if candidate.components().count() > 1 {
        return candidate.is_file();
    }
    std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths).any(|dir| {
                let full = dir.join(bin);
                full.is_file() || (cfg!(windows) && full.with_extension("exe").is_file())
            })
        })
        .unwrap_or(false)
}

/// All skills found under one directory.
#[derive(Debug, Clone, Default)]
pub struct SkillLibrary {
    skills: Vec<Skill>,
}

impl SkillLibrary {
    /// Scan `dir/*/SKILL.md`.
    ///
    /// A missing directory yields an empty library. Skills that fail to
    /// parse are logged and skipped.
    pub fn load(dir: &Path) -> Result<Self, SkillError> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(dir = %dir.display(), "No skills directory");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(SkillError::Io {
                    path: dir.to_path_buf(),
                    source,
                });
            }
        };

        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir() && p.join(SKILL_FILE).is_file())
            .collect();
        dirs.sort();

        let mut skills = Vec::new();
        for skill_dir in dirs {
            let file = skill_dir.join(SKILL_FILE);
            let parsed = std::fs::read_to_string(&file)
                .map_err(|source| SkillError::Io { path: file, source })
                .and_then(|doc| Skill::parse(&skill_dir, &doc));

            match parsed {
                Ok(skill) => {
                    for bin in &skill.missing_bins {
                        warn!(skill = %skill.name, bin = %bin, "Required binary not found in PATH");
                    }
                    info!(skill = %skill.name, "Loaded skill");
                    skills.push(skill);
                }
                Err(e) => warn!(error = %e, "Skipping skill"),
            }
        }

        Ok(Self { skills })
    }

    pub fn skills(&self) -> &[Skill] {
        &self.skills
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    /// Environment contributed by every skill, in load order.
    pub fn env(&self) -> Vec<(String, String)> {
        self.skills.iter().flat_map(|s| s.env.iter().cloned()).collect()
    }

    /// System-prompt text describing every skill. Empty when there are none.
    pub fn context(&self) -> String {
        if self.skills.is_empty() {
            return String::new();
        }

        let mut out = String::from(CONTEXT_HEADER);
        for skill in &self.skills {
            out.push_str(&format!("## Skill: {}\n", skill.name));
            out.push_str(&format!("Description: {}\n", skill.description));
            out.push_str(&format!("Path: {}\n", skill.path.display()));
            out.push_str("\n--- Skill Documentation ---\n");
            out.push_str(&skill.document);
            out.push_str("\n---------------------------\n\n");
        }
        out
    }
}
