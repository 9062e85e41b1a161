//! Plan-output parsing.
//!
//! Turns Terraform's human-readable plan text into per-resource change
//! records. The parser is a line tokenizer, not a grammar: lines that do not
//! match a change marker are ignored, and nothing here ever fails.
//!
//! Recognized lines:
//! - `<marker> <type>.<name>` where the marker is `~`, `+`, `-`, `±`, `-/+` or `+/-`
//! - `# <address> ... will be created|updated in-place|destroyed|replaced` headers,
//!   including tainted and deposed objects
//! - the `Plan: N to add, M to change, K to destroy.` summary

use serde::{Deserialize, Serialize};

/// What the plan will do to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Create,
    Update,
    Destroy,
    Replace,
    Unknown,
}

impl ChangeAction {
    /// Action for a leading change marker.
    pub fn from_marker(marker: &str) -> Self {
        match marker {
            "+" => ChangeAction::Create,
            "~" => ChangeAction::Update,
            "-" => ChangeAction::Destroy,
            "±" | "-/+" | "+/-" => ChangeAction::Replace,
            _ => ChangeAction::Unknown,
        }
    }

    /// Action for the text following the address of a `# <address> ...`
    /// header line, e.g. `is tainted, so must be replaced` or
    /// `(deposed object 1a2b3c4d) will be destroyed`.
    pub fn from_header(verb: &str) -> Self {
        const PHRASES: [(&str, ChangeAction); 7] = [
            ("must be replaced", ChangeAction::Replace),
            ("will be replaced", ChangeAction::Replace),
            ("will be created", ChangeAction::Create),
            ("will be destroyed", ChangeAction::Destroy),
            ("has been deleted", ChangeAction::Destroy),
            ("will be updated in-place", ChangeAction::Update),
            ("has changed", ChangeAction::Update),
        ];

        PHRASES
            .iter()
            .find(|(phrase, _)| verb.contains(phrase))
            .map(|(_, action)| *action)
            .unwrap_or(ChangeAction::Unknown)
    }
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChangeAction::Create => "create",
            ChangeAction::Update => "update",
            ChangeAction::Destroy => "destroy",
            ChangeAction::Replace => "replace",
            ChangeAction::Unknown => "unknown",
        };
        f.pad(s)
    }
}

/// One change extracted from plan text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceChange {
    pub resource_type: String,
    /// Resource name within its type, including any index suffix
    pub identifier: String,
    pub action: ChangeAction,
    /// Full address as printed, including module path
    pub address: String,
}

/// Counts from the plan summary line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub to_import: u32,
    pub to_add: u32,
    pub to_change: u32,
    pub to_destroy: u32,
}

impl PlanSummary {
    pub fn total(&self) -> u32 {
        self.to_import + self.to_add + self.to_change + self.to_destroy
    }
}

/// Converts plan output into structured changes.
///
/// Implementations must be pure: the same text always yields the same
/// changes in first-occurrence order.
pub trait PlanOutputParser: Send + Sync {
    /// Extract every change, in order. Repeated markers yield repeated entries.
    fn parse(&self, plan_text: &str) -> Vec<ResourceChange>;

    /// Extract the summary line, if present.
    fn summary(&self, plan_text: &str) -> Option<PlanSummary>;
}

/// Parser for Terraform's plain-text plan output.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerraformPlanParser;

impl TerraformPlanParser {
    pub fn new() -> Self {
        Self
    }

    fn parse_line(line: &str) -> Option<ResourceChange> {
        let line = strip_ansi(line);
        let trimmed = line.trim_start();

        if let Some(rest) = trimmed.strip_prefix('#') {
            let rest = rest.trim_start();
            let (address, verb) = rest.split_once(char::is_whitespace)?;
            let (resource_type, identifier) = split_address(address)?;
            return Some(ResourceChange {
                resource_type,
                identifier,
                action: ChangeAction::from_header(verb),
                address: address.to_string(),
            });
        }

        let marker = ["-/+", "+/-", "±", "~", "+", "-"]
            .into_iter()
            .find(|m| trimmed.starts_with(m))?;
        let rest = &trimmed[marker.len()..];
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let address = rest.split_whitespace().next()?;
        let (resource_type, identifier) = split_address(address)?;

        Some(ResourceChange {
            resource_type,
            identifier,
            action: ChangeAction::from_marker(marker),
            address: address.to_string(),
        })
    }
}

impl PlanOutputParser for TerraformPlanParser {
    fn parse(&self, plan_text: &str) -> Vec<ResourceChange> {
        plan_text.lines().filter_map(Self::parse_line).collect()
    }

    fn summary(&self, plan_text: &str) -> Option<PlanSummary> {
        for line in plan_text.lines() {
            let line = strip_ansi(line);
            let trimmed = line.trim();
            if trimmed.starts_with("No changes.") {
                return Some(PlanSummary::default());
            }
            let Some(counts) = trimmed.strip_prefix("Plan:") else {
                continue;
            };

            let mut summary = PlanSummary::default();
            for part in counts.trim_end_matches('.').split(',') {
                let mut words = part.split_whitespace();
                let count = words.next().and_then(|n| n.parse::<u32>().ok());
                let verb = words.nth(1);
                match (count, verb) {
                    (Some(n), Some("import")) => summary.to_import = n,
                    (Some(n), Some("add")) => summary.to_add = n,
                    (Some(n), Some("change")) => summary.to_change = n,
                    (Some(n), Some("destroy")) => summary.to_destroy = n,
                    _ => {}
                }
            }
            return Some(summary);
        }
        None
    }
}

/// Split `[module.<m>.]*<type>.<name>` into type and name.
///
/// The type must look like `<provider>_<kind>`; data sources and attribute
/// paths are rejected.
fn split_address(address: &str) -> Option<(String, String)> {
    let mut rest = address;
    while let Some(after) = rest.strip_prefix("module.") {
        rest = skip_segment(after)?;
    }

    let (resource_type, name) = rest.split_once('.')?;
    if !is_resource_type(resource_type) || !is_resource_name(name) {
        return None;
    }
    Some((resource_type.to_string(), name.to_string()))
}

/// Skip one `<name>[<index>].` segment, returning what follows it.
fn skip_segment(segment: &str) -> Option<&str> {
    let name_end = segment.find(['.', '['])?;
    let mut rest = &segment[name_end..];
    if rest.starts_with('[') {
        let close = rest.find(']')?;
        rest = &rest[close + 1..];
    }
    rest.strip_prefix('.')
}

fn is_resource_type(s: &str) -> bool {
    s.contains('_')
        && s.starts_with(|c: char| c.is_ascii_lowercase())
        && s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn is_resource_name(s: &str) -> bool {
    let base = match s.find('[') {
        Some(open) if s.ends_with(']') => &s[..open],
        Some(_) => return false,
        None => s,
    };
    base.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
        && base.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Remove ANSI color sequences.
fn strip_ansi(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            for next in chars.by_ref() {
                if next.is_ascii_alphabetic() {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Vec<ResourceChange> {
        TerraformPlanParser::new().parse(text)
    }

    fn change(resource_type: &str, identifier: &str, action: ChangeAction) -> (String, String, ChangeAction) {
        (resource_type.to_string(), identifier.to_string(), action)
    }

    fn simplified(changes: &[ResourceChange]) -> Vec<(String, String, ChangeAction)> {
        changes
            .iter()
            .map(|c| (c.resource_type.clone(), c.identifier.clone(), c.action))
            .collect()
    }

    #[test]
    fn test_update_and_create_markers() {
        let changes = parse("~ aws_instance.web\n+ aws_s3_bucket.data\n");
        assert_eq!(
            simplified(&changes),
            vec![
                change("aws_instance", "web", ChangeAction::Update),
                change("aws_s3_bucket", "data", ChangeAction::Create),
            ]
        );
        assert_eq!(changes[0].address, "aws_instance.web");
    }

    #[test]
    fn test_destroy_and_replace_markers() {
        let text = "  - aws_sqs_queue.jobs\n  ± aws_db_instance.main\n-/+ aws_instance.api (new resource required)\n";
        assert_eq!(
            simplified(&parse(text)),
            vec![
                change("aws_sqs_queue", "jobs", ChangeAction::Destroy),
                change("aws_db_instance", "main", ChangeAction::Replace),
                change("aws_instance", "api", ChangeAction::Replace),
            ]
        );
    }

    #[test]
    fn test_duplicate_markers_are_kept() {
        let changes = parse("~ aws_instance.web\nsome text\n~ aws_instance.web\n");
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0], changes[1]);
    }

    #[test]
    fn test_surrounding_text_is_ignored() {
        let text = r#"
Terraform used the selected providers to generate the following execution
plan. Resource actions are indicated with the following symbols:
  ~ update in-place

  ~ resource "aws_instance" "web" {
      ~ instance_type = "t3.micro" -> "t3.large"
      + tags          = {
          + "Team" = "core"
        }
    }

- not.a_resource
+ tags.Name
Plan: 0 to add, 1 to change, 0 to destroy.
"#;
        assert!(parse(text).is_empty());
    }

    #[test]
    fn test_header_lines() {
        let text = r#"
  # aws_instance.web will be updated in-place
  # aws_s3_bucket.logs will be created
  # module.network.aws_vpc.main must be replaced
  # aws_sqs_queue.jobs will be destroyed
  # aws_lb.front has changed
  # aws_iam_role.app will be moved
"#;
        let changes = parse(text);
        assert_eq!(
            simplified(&changes),
            vec![
                change("aws_instance", "web", ChangeAction::Update),
                change("aws_s3_bucket", "logs", ChangeAction::Create),
                change("aws_vpc", "main", ChangeAction::Replace),
                change("aws_sqs_queue", "jobs", ChangeAction::Destroy),
                change("aws_lb", "front", ChangeAction::Update),
                change("aws_iam_role", "app", ChangeAction::Unknown),
            ]
        );
        assert_eq!(changes[2].address, "module.network.aws_vpc.main");
    }

    #[test]
    fn test_tainted_and_deposed_headers() {
        let text = r#"
  # aws_instance.web is tainted, so must be replaced
  # aws_db_instance.orders (deposed object 1a2b3c4d) will be destroyed
  # aws_lb.front will be replaced, as requested
"#;
        let changes = parse(text);
        assert_eq!(
            simplified(&changes),
            vec![
                change("aws_instance", "web", ChangeAction::Replace),
                change("aws_db_instance", "orders", ChangeAction::Destroy),
                change("aws_lb", "front", ChangeAction::Replace),
            ]
        );
        assert_eq!(changes[1].address, "aws_db_instance.orders");
    }

    #[test]
    fn test_data_sources_and_comments_ignored() {
        let text = "  # data.aws_ami.ubuntu will be read during apply\n# Generated by skyloom\n";
        assert!(parse(text).is_empty());
    }

    #[test]
    fn test_indexed_addresses() {
        let changes = parse("+ aws_subnet.private[0]\n+ module.app[\"eu\"].aws_instance.web[\"a\"]\n");
        assert_eq!(changes[0].identifier, "private[0]");
        assert_eq!(changes[1].resource_type, "aws_instance");
        assert_eq!(changes[1].identifier, "web[\"a\"]");
    }

    #[test]
    fn test_ansi_sequences_stripped() {
        let changes = parse("\u{1b}[33m~\u{1b}[0m aws_instance.web\n");
        assert_eq!(simplified(&changes), vec![change("aws_instance", "web", ChangeAction::Update)]);
    }

    #[test]
    fn test_parse_is_pure() {
        let text = "+ aws_vpc.main\n~ aws_subnet.app\n";
        assert_eq!(parse(text), parse(text));
    }

    #[test]
    fn test_summary_line() {
        let parser = TerraformPlanParser::new();
        let summary = parser
            .summary("noise\nPlan: 2 to add, 1 to change, 3 to destroy.\n")
            .unwrap();
        assert_eq!(
            summary,
            PlanSummary {
                to_import: 0,
                to_add: 2,
                to_change: 1,
                to_destroy: 3
            }
        );
        assert_eq!(summary.total(), 6);

        let with_import = parser
            .summary("Plan: 1 to import, 0 to add, 0 to change, 0 to destroy.")
            .unwrap();
        assert_eq!(with_import.to_import, 1);

        assert_eq!(
            parser.summary("No changes. Your infrastructure matches the configuration."),
            Some(PlanSummary::default())
        );
        assert_eq!(parser.summary("Error: invalid provider"), None);
    }

    #[test]
    fn test_action_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ChangeAction::Update).unwrap(), "\"update\"");
        assert_eq!(ChangeAction::Replace.to_string(), "replace");
    }
}
