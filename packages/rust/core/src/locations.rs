//! Set code → physical location mapping, with interactive assignment for
//! sets seen for the first time.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::LazyLock;

use cardpick_shared::{CardpickError, Result, is_missing};
use cardpick_storage::JsonFile;
use regex::Regex;
use tracing::{debug, info, warn};

static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("valid regex"));

// ---------------------------------------------------------------------------
// Natural ordering
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Chunk {
    Text(String),
    Number(u128),
}

fn natural_chunks(s: &str) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut last = 0;
    for m in DIGITS.find_iter(s) {
        chunks.push(Chunk::Text(s[last..m.start()].to_lowercase()));
        chunks.push(Chunk::Number(m.as_str().parse().unwrap_or(u128::MAX)));
        last = m.end();
    }
    chunks.push(Chunk::Text(s[last..].to_lowercase()));
    chunks
}

/// Compare labels so that "Location 2" sorts before "Location 10".
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natural_chunks(a).cmp(&natural_chunks(b)).then_with(|| a.cmp(b))
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// What to do with a set code that has no location yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationDecision {
    Assign(String),
    /// Leave the set unmapped for now.
    Defer,
}

/// Decides locations for unknown set codes.
pub trait LocationPolicy {
    /// `labels` are the distinct existing labels in natural order.
    fn decide(&mut self, set_code: &str, labels: &[String]) -> Result<LocationDecision>;
}

impl<P: LocationPolicy + ?Sized> LocationPolicy for Box<P> {
    fn decide(&mut self, set_code: &str, labels: &[String]) -> Result<LocationDecision> {
        (**self).decide(set_code, labels)
    }
}

/// Assign every unknown set to one fixed label.
#[derive(Debug, Clone)]
pub struct AutoAssign {
    pub label: String,
}

impl LocationPolicy for AutoAssign {
    fn decide(&mut self, _set_code: &str, _labels: &[String]) -> Result<LocationDecision> {
        Ok(LocationDecision::Assign(self.label.clone()))
    }
}

/// Never assign; unknown sets get the default label and stay unmapped.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectUnknown;

impl LocationPolicy for RejectUnknown {
    fn decide(&mut self, set_code: &str, _labels: &[String]) -> Result<LocationDecision> {
        warn!(set_code, "no location for set, leaving unassigned");
        Ok(LocationDecision::Defer)
    }
}

/// Ask the operator on a line-oriented terminal.
pub struct PromptOperator<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptOperator<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn say(&mut self, text: &str) -> Result<()> {
        writeln!(self.output, "{text}").map_err(|e| CardpickError::Input(e.to_string()))
    }

    fn ask(&mut self, prompt: &str) -> Result<Option<String>> {
        write!(self.output, "{prompt}")
            .and_then(|_| self.output.flush())
            .map_err(|e| CardpickError::Input(e.to_string()))?;

        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .map_err(|e| CardpickError::Input(e.to_string()))?;
        Ok((read > 0).then(|| line.trim().to_string()))
    }
}

impl<R: BufRead, W: Write> LocationPolicy for PromptOperator<R, W> {
    fn decide(&mut self, set_code: &str, labels: &[String]) -> Result<LocationDecision> {
        let create = labels.len() + 1;

        self.say(&format!("\nNew set found: {set_code}"))?;
        self.say("Existing locations:")?;
        for (i, label) in labels.iter().enumerate() {
            self.say(&format!("  {}: {label}", i + 1))?;
        }
        self.say(&format!("  {create}: Create new location"))?;

        loop {
            let Some(choice) = self.ask(&format!("Select location for {set_code} (1-{create}): "))?
            else {
                return Ok(LocationDecision::Defer);
            };

            match choice.parse::<usize>() {
                Ok(n) if (1..create).contains(&n) => {
                    return Ok(LocationDecision::Assign(labels[n - 1].clone()));
                }
                Ok(n) if n == create => {
                    let Some(name) = self.ask("Enter new location name: ")? else {
                        return Ok(LocationDecision::Defer);
                    };
                    if name.is_empty() {
                        self.say("Location name cannot be empty.")?;
                    } else {
                        return Ok(LocationDecision::Assign(name));
                    }
                }
                Ok(_) => self.say(&format!("Please enter a number between 1 and {create}."))?,
                Err(_) => self.say("Please enter a valid number.")?,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// LocationResolver
// ---------------------------------------------------------------------------

/// Owns the persisted location mapping and resolves set codes through it.
pub struct LocationResolver<P> {
    file: JsonFile,
    mapping: BTreeMap<String, String>,
    asked: HashSet<String>,
    policy: P,
    default_label: String,
    changed: bool,
}

impl<P: LocationPolicy> LocationResolver<P> {
    /// Load the mapping from `path`. Missing or malformed files start empty.
    pub fn open(path: impl Into<PathBuf>, policy: P, default_label: impl Into<String>) -> Self {
        let file = JsonFile::new(path);
        let raw: BTreeMap<String, String> = file.load_or_default();

        let mut mapping = BTreeMap::new();
        for (set, label) in raw {
            mapping.entry(set.trim().to_uppercase()).or_insert(label);
        }
        debug!(sets = mapping.len(), path = %file.path().display(), "location mapping loaded");

        Self {
            file,
            mapping,
            asked: HashSet::new(),
            policy,
            default_label: default_label.into(),
            changed: false,
        }
    }

    /// Location for `set_code`, asking the policy at most once per run.
    pub fn resolve(&mut self, set_code: &str) -> String {
        if is_missing(set_code) {
            return self.default_label.clone();
        }

        let key = set_code.trim().to_uppercase();
        if let Some(label) = self.mapping.get(&key) {
            return label.clone();
        }
        if !self.asked.insert(key.clone()) {
            return self.default_label.clone();
        }

        let labels = self.known_labels();
        match self.policy.decide(set_code.trim(), &labels) {
            Ok(LocationDecision::Assign(label)) => {
                info!(set = %key, location = %label, "assigned location");
                self.mapping.insert(key, label.clone());
                self.changed = true;
                label
            }
            Ok(LocationDecision::Defer) => self.default_label.clone(),
            Err(e) => {
                warn!(set = %key, error = %e, "location prompt failed, leaving unassigned");
                self.default_label.clone()
            }
        }
    }

    /// Distinct labels in natural order.
    pub fn known_labels(&self) -> Vec<String> {
        let distinct: BTreeSet<&String> = self.mapping.values().collect();
        let mut labels: Vec<String> = distinct.into_iter().cloned().collect();
        labels.sort_by(|a, b| natural_cmp(a, b));
        labels
    }

    pub fn mapping(&self) -> &BTreeMap<String, String> {
        &self.mapping
    }

    pub fn default_label(&self) -> &str {
        &self.default_label
    }

    /// Explicitly map a set to a label, replacing any earlier assignment.
    pub fn assign(&mut self, set_code: &str, label: &str) -> Result<()> {
        if is_missing(set_code) {
            return Err(CardpickError::validation("set code cannot be empty"));
        }
        let label = label.trim();
        if label.is_empty() {
            return Err(CardpickError::validation("Location name cannot be empty."));
        }
        self.mapping
            .insert(set_code.trim().to_uppercase(), label.to_string());
        self.changed = true;
        Ok(())
    }

    /// Drop a set's assignment. Returns the label it had.
    pub fn remove(&mut self, set_code: &str) -> Option<String> {
        let removed = self.mapping.remove(&set_code.trim().to_uppercase());
        if removed.is_some() {
            self.changed = true;
        }
        removed
    }

    /// Rewrite the mapping file only if something changed this run.
    pub fn save_if_changed(&mut self) -> Result<bool> {
        if !self.changed {
            return Ok(false);
        }
        self.file.save(&self.mapping)?;
        self.changed = false;
        info!(sets = self.mapping.len(), path = %self.file.path().display(), "location mapping saved");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    /// Counts how often it is consulted.
    struct Counting {
        calls: usize,
        answer: LocationDecision,
    }

    impl LocationPolicy for Counting {
        fn decide(&mut self, _set: &str, _labels: &[String]) -> Result<LocationDecision> {
            self.calls += 1;
            Ok(self.answer.clone())
        }
    }

    fn seeded(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("locations.json");
        std::fs::write(
            &path,
            r#"{"dmu": "Binder 10", "MH2": "Binder 2", "LEA": "Vault"}"#,
        )
        .unwrap();
        path
    }

    #[test]
    fn natural_order_of_labels() {
        let mut labels = vec!["Location 10", "location 2", "Binder", "Location 1"];
        labels.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(labels, vec!["Binder", "Location 1", "location 2", "Location 10"]);
    }

    #[test]
    fn known_keys_resolve_without_prompting() {
        let dir = tempfile::tempdir().unwrap();
        let policy = Counting {
            calls: 0,
            answer: LocationDecision::Defer,
        };
        let mut resolver = LocationResolver::open(seeded(&dir), policy, "Unassigned");

        assert_eq!(resolver.resolve("mh2"), "Binder 2");
        assert_eq!(resolver.resolve("DMU"), "Binder 10");
        assert_eq!(resolver.policy.calls, 0);
        assert!(!resolver.save_if_changed().unwrap());
    }

    #[test]
    fn unknown_set_is_asked_once_per_run() {
        let dir = tempfile::tempdir().unwrap();
        let policy = Counting {
            calls: 0,
            answer: LocationDecision::Defer,
        };
        let mut resolver = LocationResolver::open(seeded(&dir), policy, "Unassigned");

        assert_eq!(resolver.resolve("ONE"), "Unassigned");
        assert_eq!(resolver.resolve("one"), "Unassigned");
        assert_eq!(resolver.policy.calls, 1);
    }

    #[test]
    fn missing_set_codes_skip_the_policy() {
        let dir = tempfile::tempdir().unwrap();
        let policy = Counting {
            calls: 0,
            answer: LocationDecision::Assign("X".into()),
        };
        let mut resolver = LocationResolver::open(dir.path().join("none.json"), policy, "Unassigned");

        assert_eq!(resolver.resolve(""), "Unassigned");
        assert_eq!(resolver.resolve("N/A"), "Unassigned");
        assert_eq!(resolver.policy.calls, 0);
    }

    #[test]
    fn auto_assign_persists_uppercase_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = seeded(&dir);
        let mut resolver = LocationResolver::open(
            &path,
            AutoAssign {
                label: "Overflow".into(),
            },
            "Unassigned",
        );

        assert_eq!(resolver.resolve("woe"), "Overflow");
        assert!(resolver.save_if_changed().unwrap());

        let saved: BTreeMap<String, String> = JsonFile::new(&path).load_or_default();
        assert_eq!(saved.get("WOE").map(String::as_str), Some("Overflow"));
        assert_eq!(saved.get("DMU").map(String::as_str), Some("Binder 10"));
        assert!(!saved.contains_key("dmu"));
    }

    #[test]
    fn reject_unknown_leaves_set_unmapped() {
        let dir = tempfile::tempdir().unwrap();
        let mut resolver = LocationResolver::open(seeded(&dir), RejectUnknown, "Unassigned");

        assert_eq!(resolver.resolve("WOE"), "Unassigned");
        assert!(!resolver.mapping().contains_key("WOE"));
        assert!(!resolver.save_if_changed().unwrap());
    }

    #[test]
    fn prompt_lists_labels_and_reasks_on_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = Cursor::new("abc\n9\n2\n");
        let mut output = Vec::new();
        {
            let prompt = PromptOperator::new(input, &mut output);
            let mut resolver = LocationResolver::open(seeded(&dir), prompt, "Unassigned");
            assert_eq!(resolver.resolve("WOE"), "Binder 10");
        }

        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("New set found: WOE"));
        assert!(text.contains("  1: Binder 2\n  2: Binder 10\n  3: Vault\n  4: Create new location"));
        assert!(text.contains("Please enter a valid number."));
        assert!(text.contains("Please enter a number between 1 and 4."));
    }

    #[test]
    fn prompt_creates_new_label_after_empty_name() {
        let input = Cursor::new("1\n\n1\nShelf A\n");
        let mut output = Vec::new();
        let mut prompt = PromptOperator::new(input, &mut output);

        let decision = prompt.decide("WOE", &[]).unwrap();
        assert_eq!(decision, LocationDecision::Assign("Shelf A".into()));
        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("Location name cannot be empty."));
    }

    #[test]
    fn prompt_defers_at_end_of_input() {
        let mut prompt = PromptOperator::new(Cursor::new(""), Vec::new());
        assert_eq!(
            prompt.decide("WOE", &["Binder 1".into()]).unwrap(),
            LocationDecision::Defer
        );
    }

    #[test]
    fn explicit_assign_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let path = seeded(&dir);
        let mut resolver = LocationResolver::open(&path, RejectUnknown, "Unassigned");

        resolver.assign("mh2", "Binder 3").unwrap();
        assert!(resolver.assign("MH2", "  ").is_err());
        assert_eq!(resolver.remove("lea").as_deref(), Some("Vault"));
        assert_eq!(resolver.remove("lea"), None);
        assert!(resolver.save_if_changed().unwrap());

        let saved: BTreeMap<String, String> = JsonFile::new(&path).load_or_default();
        assert_eq!(saved.get("MH2").map(String::as_str), Some("Binder 3"));
        assert!(!saved.contains_key("LEA"));
    }

    #[test]
    fn malformed_mapping_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locations.json");
        std::fs::write(&path, "[1, 2").unwrap();

        let resolver = LocationResolver::open(&path, RejectUnknown, "Unassigned");
        assert!(resolver.mapping().is_empty());
    }
}
