//! Resource catalog.
//!
//! Static registry mapping each supported resource kind to its Terraform
//! resource type, default configuration and value constraints.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Design-time resource kinds.
///
/// Kinds the catalog does not know are kept as `Unsupported` so the compiler
/// can emit a placeholder for them instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResourceKind {
    Instance,
    Bucket,
    Database,
    Function,
    Vpc,
    Subnet,
    SecurityGroup,
    LoadBalancer,
    KeyValueTable,
    Queue,
    InternetGateway,
    Unsupported(String),
}

impl ResourceKind {
    /// Parse a kind name, accepting editor aliases and Terraform type names.
    pub fn parse(s: &str) -> Self {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "instance" | "compute" | "ec2" | "aws_instance" => ResourceKind::Instance,
            "bucket" | "s3" | "object_storage" | "aws_s3_bucket" => ResourceKind::Bucket,
            "database" | "db" | "rds" | "aws_db_instance" => ResourceKind::Database,
            "function" | "lambda" | "aws_lambda_function" => ResourceKind::Function,
            "vpc" | "vpcgroup" | "virtual_network" | "aws_vpc" => ResourceKind::Vpc,
            "subnet" | "aws_subnet" => ResourceKind::Subnet,
            "security_group" | "sg" | "aws_security_group" => ResourceKind::SecurityGroup,
            "load_balancer" | "lb" | "alb" | "elb" | "aws_lb" => ResourceKind::LoadBalancer,
            "key_value_table" | "table" | "dynamodb" | "aws_dynamodb_table" => ResourceKind::KeyValueTable,
            "queue" | "sqs" | "aws_sqs_queue" => ResourceKind::Queue,
            "internet_gateway" | "gateway" | "igw" | "aws_internet_gateway" => ResourceKind::InternetGateway,
            _ => ResourceKind::Unsupported(s.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ResourceKind::Instance => "instance",
            ResourceKind::Bucket => "bucket",
            ResourceKind::Database => "database",
            ResourceKind::Function => "function",
            ResourceKind::Vpc => "vpc",
            ResourceKind::Subnet => "subnet",
            ResourceKind::SecurityGroup => "security_group",
            ResourceKind::LoadBalancer => "load_balancer",
            ResourceKind::KeyValueTable => "key_value_table",
            ResourceKind::Queue => "queue",
            ResourceKind::InternetGateway => "internet_gateway",
            ResourceKind::Unsupported(raw) => raw,
        }
    }

    /// Every supported kind, in catalog order.
    pub fn all() -> Vec<Self> {
        vec![
            ResourceKind::Instance,
            ResourceKind::Bucket,
            ResourceKind::Database,
            ResourceKind::Function,
            ResourceKind::Vpc,
            ResourceKind::Subnet,
            ResourceKind::SecurityGroup,
            ResourceKind::LoadBalancer,
            ResourceKind::KeyValueTable,
            ResourceKind::Queue,
            ResourceKind::InternetGateway,
        ]
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, ResourceKind::Unsupported(_))
    }

    /// Human-readable name used in generated comments.
    pub fn display_name(&self) -> &str {
        match self {
            ResourceKind::Instance => "Compute Instance",
            ResourceKind::Bucket => "Object Bucket",
            ResourceKind::Database => "Relational Database",
            ResourceKind::Function => "Function",
            ResourceKind::Vpc => "Virtual Network",
            ResourceKind::Subnet => "Subnet",
            ResourceKind::SecurityGroup => "Security Group",
            ResourceKind::LoadBalancer => "Load Balancer",
            ResourceKind::KeyValueTable => "Key-Value Table",
            ResourceKind::Queue => "Queue",
            ResourceKind::InternetGateway => "Internet Gateway",
            ResourceKind::Unsupported(raw) => raw,
        }
    }
}

impl From<String> for ResourceKind {
    fn from(s: String) -> Self {
        ResourceKind::parse(&s)
    }
}

impl From<&str> for ResourceKind {
    fn from(s: &str) -> Self {
        ResourceKind::parse(s)
    }
}

impl From<ResourceKind> for String {
    fn from(kind: ResourceKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How an attribute's default is produced.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    /// A fixed value.
    Value(Value),
    /// A provider-side name derived from the node's local name.
    Name(NameRule),
    /// No default; the attribute is only emitted when the user sets it.
    None,
}

impl DefaultValue {
    /// Resolve the default for a node with the given local name.
    pub fn resolve(&self, local_name: &str) -> Option<Value> {
        match self {
            DefaultValue::Value(v) => Some(v.clone()),
            DefaultValue::Name(rule) => Some(Value::String(rule.apply(local_name))),
            DefaultValue::None => None,
        }
    }
}

/// Shape of a provider-side name built from a local name.
///
/// The result always starts with a letter or digit, never ends with the
/// separator and has between `min_len` and `max_len` characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameRule {
    pub separator: char,
    pub min_len: usize,
    pub max_len: usize,
    /// Word put in front of digit-leading names and used as padding.
    pub prefix: &'static str,
}

impl NameRule {
    /// Words joined by `-`.
    pub const fn hyphenated(min_len: usize, max_len: usize, prefix: &'static str) -> Self {
        Self {
            separator: '-',
            min_len,
            max_len,
            prefix,
        }
    }

    /// Words joined by `_`.
    pub const fn underscored(min_len: usize, max_len: usize, prefix: &'static str) -> Self {
        Self {
            separator: '_',
            min_len,
            max_len,
            prefix,
        }
    }

    /// Build the name for a local name.
    pub fn apply(&self, local_name: &str) -> String {
        let separator = self.separator.to_string();
        let words: Vec<&str> = local_name.split('_').filter(|w| !w.is_empty()).collect();

        let mut name = match words.first() {
            None => self.prefix.to_string(),
            Some(first) if first.starts_with(|c: char| c.is_ascii_digit()) => {
                format!("{}{}{}", self.prefix, separator, words.join(separator.as_str()))
            }
            Some(_) => words.join(separator.as_str()),
        };

        while name.len() < self.min_len {
            name.push_str(&separator);
            name.push_str(self.prefix);
        }

        // Local names are ASCII, so byte truncation stays on a char boundary.
        name.truncate(self.max_len);
        name.trim_end_matches(self.separator).to_string()
    }
}

impl std::fmt::Display for NameRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shape = if self.separator == '-' { "local-name" } else { "local_name" };
        write!(f, "<{}> ({}-{} chars)", shape, self.min_len, self.max_len)
    }
}

/// A regular expression compiled once, when the catalog is built.
#[derive(Debug, Clone)]
pub struct ValuePattern {
    source: &'static str,
    regex: Option<Regex>,
}

impl ValuePattern {
    pub fn new(source: &'static str) -> Self {
        Self {
            source,
            regex: Regex::new(source).ok(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.source
    }

    /// Whether the source compiled. Invalid patterns match nothing.
    pub fn is_valid(&self) -> bool {
        self.regex.is_some()
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex.as_ref().is_some_and(|re| re.is_match(value))
    }
}

impl PartialEq for ValuePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// Constraint a value must satisfy to be valid for the provider.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Any,
    Boolean,
    NonEmpty,
    OneOf(&'static [&'static str]),
    Pattern(ValuePattern),
    Range(i64, i64),
}

impl Constraint {
    pub fn pattern(source: &'static str) -> Self {
        Constraint::Pattern(ValuePattern::new(source))
    }

    /// Check a value against this constraint.
    pub fn check(&self, value: &Value) -> bool {
        match self {
            Constraint::Any => true,
            Constraint::Boolean => value.is_boolean(),
            Constraint::NonEmpty => value.as_str().is_some_and(|s| !s.trim().is_empty()),
            Constraint::OneOf(options) => value.as_str().is_some_and(|s| options.contains(&s)),
            Constraint::Pattern(pattern) => value.as_str().is_some_and(|s| pattern.is_match(s)),
            Constraint::Range(min, max) => value.as_i64().is_some_and(|n| n >= *min && n <= *max),
        }
    }
}

/// Whether an attribute is written into the resource block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeRole {
    /// Emitted as an argument of the resource block.
    Argument,
    /// Consumed by the compiler to shape a companion block.
    Directive,
}

/// One configurable attribute of a resource kind.
#[derive(Debug, Clone)]
pub struct AttributeSpec {
    pub name: &'static str,
    pub default: DefaultValue,
    pub constraint: Constraint,
    pub role: AttributeRole,
}

impl AttributeSpec {
    fn new(name: &'static str, default: DefaultValue, constraint: Constraint) -> Self {
        Self {
            name,
            default,
            constraint,
            role: AttributeRole::Argument,
        }
    }

    fn value(name: &'static str, default: Value, constraint: Constraint) -> Self {
        Self::new(name, DefaultValue::Value(default), constraint)
    }

    fn directive(mut self) -> Self {
        self.role = AttributeRole::Directive;
        self
    }
}

/// Network containment: the reference attribute set from a node's parent.
#[derive(Debug, Clone)]
pub struct Containment {
    pub attribute: &'static str,
    pub parent: ResourceKind,
}

/// Catalog entry for one supported kind.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub kind: ResourceKind,
    pub terraform_type: &'static str,
    pub attributes: Vec<AttributeSpec>,
    pub containment: Option<Containment>,
    pub taggable: bool,
}

impl CatalogEntry {
    fn new(kind: ResourceKind, terraform_type: &'static str) -> Self {
        Self {
            kind,
            terraform_type,
            attributes: Vec::new(),
            containment: None,
            taggable: true,
        }
    }

    fn attribute(mut self, spec: AttributeSpec) -> Self {
        self.attributes.push(spec);
        self
    }

    fn contained_in(mut self, attribute: &'static str, parent: ResourceKind) -> Self {
        self.containment = Some(Containment { attribute, parent });
        self
    }

    /// Look up an attribute spec by name.
    pub fn attribute_spec(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

const CIDR_PATTERN: &str = r"^(\d{1,3}\.){3}\d{1,3}/\d{1,2}$";

/// Registry of supported resource kinds.
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::aws()
    }
}

impl Catalog {
    /// The AWS catalog.
    pub fn aws() -> Self {
        use AttributeSpec as A;
        use Constraint::*;
        let pattern = Constraint::pattern;

        let entries = vec![
            CatalogEntry::new(ResourceKind::Instance, "aws_instance")
                .attribute(A::value("ami", json!("ami-0c55b159cbfafe1f0"), pattern(r"^ami-[0-9a-f]{8,17}$")))
                .attribute(A::value("instance_type", json!("t3.micro"), pattern(r"^[a-z][a-z0-9-]*\.[a-z0-9]+$")))
                .contained_in("subnet_id", ResourceKind::Subnet),
            CatalogEntry::new(ResourceKind::Bucket, "aws_s3_bucket")
                .attribute(A::new(
                    "bucket",
                    DefaultValue::Name(NameRule::hyphenated(3, 63, "bucket")),
                    pattern(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$"),
                ))
                .attribute(A::value("force_destroy", json!(false), Boolean))
                .attribute(A::value("versioning", json!(true), Boolean).directive()),
            CatalogEntry::new(ResourceKind::Database, "aws_db_instance")
                .attribute(A::new(
                    "identifier",
                    DefaultValue::Name(NameRule::hyphenated(1, 63, "db")),
                    pattern(r"^[a-z][a-z0-9-]{0,62}$"),
                ))
                .attribute(A::value(
                    "engine",
                    json!("postgres"),
                    OneOf(&["postgres", "mysql", "mariadb", "oracle-se2", "sqlserver-ex"]),
                ))
                .attribute(A::value("engine_version", json!("15.4"), pattern(r"^\d+(\.\d+)*$")))
                .attribute(A::value("instance_class", json!("db.t3.micro"), pattern(r"^db\.[a-z0-9]+\.[a-z0-9]+$")))
                .attribute(A::value("allocated_storage", json!(20), Range(20, 65536)))
                .attribute(A::value("storage_type", json!("gp2"), OneOf(&["gp2", "gp3", "io1", "io2", "standard"])))
                .attribute(A::value("db_name", json!("appdb"), pattern(r"^[A-Za-z][A-Za-z0-9_]{0,62}$")))
                .attribute(A::value("username", json!("dbadmin"), pattern(r"^[A-Za-z][A-Za-z0-9_]{0,15}$")))
                .attribute(A::value("manage_master_user_password", json!(true), Boolean))
                .attribute(A::value("storage_encrypted", json!(true), Boolean))
                .attribute(A::value("publicly_accessible", json!(false), Boolean))
                .attribute(A::value("skip_final_snapshot", json!(true), Boolean)),
            CatalogEntry::new(ResourceKind::Function, "aws_lambda_function")
                .attribute(A::new(
                    "function_name",
                    DefaultValue::Name(NameRule::underscored(1, 64, "fn")),
                    pattern(r"^[A-Za-z0-9_-]{1,64}$"),
                ))
                .attribute(A::value("filename", json!("lambda_function.zip"), NonEmpty))
                .attribute(A::value("handler", json!("index.handler"), NonEmpty))
                .attribute(A::value(
                    "runtime",
                    json!("python3.12"),
                    OneOf(&["python3.12", "python3.11", "nodejs20.x", "nodejs18.x", "java21", "provided.al2023"]),
                ))
                .attribute(A::new("role", DefaultValue::None, pattern(r"^arn:aws:iam::\d{12}:role/.+$")))
                .attribute(A::value("memory_size", json!(128), Range(128, 10240)))
                .attribute(A::value("timeout", json!(30), Range(1, 900))),
            CatalogEntry::new(ResourceKind::Vpc, "aws_vpc")
                .attribute(A::value("cidr_block", json!("10.0.0.0/16"), pattern(CIDR_PATTERN)))
                .attribute(A::value("enable_dns_support", json!(true), Boolean))
                .attribute(A::value("enable_dns_hostnames", json!(true), Boolean)),
            CatalogEntry::new(ResourceKind::Subnet, "aws_subnet")
                .attribute(A::value("cidr_block", json!("10.0.1.0/24"), pattern(CIDR_PATTERN)))
                .attribute(A::new(
                    "availability_zone",
                    DefaultValue::None,
                    pattern(r"^[a-z]{2}-[a-z]+-\d[a-z]$"),
                ))
                .attribute(A::value("map_public_ip_on_launch", json!(false), Boolean))
                .contained_in("vpc_id", ResourceKind::Vpc),
            CatalogEntry::new(ResourceKind::SecurityGroup, "aws_security_group")
                .attribute(A::new("name", DefaultValue::Name(NameRule::underscored(1, 255, "sg")), NonEmpty))
                .attribute(A::value("description", json!("Managed by skyloom"), NonEmpty))
                .contained_in("vpc_id", ResourceKind::Vpc),
            CatalogEntry::new(ResourceKind::LoadBalancer, "aws_lb")
                .attribute(A::new(
                    "name",
                    DefaultValue::Name(NameRule::hyphenated(1, 32, "lb")),
                    pattern(r"^[A-Za-z0-9-]{1,32}$"),
                ))
                .attribute(A::value("internal", json!(false), Boolean))
                .attribute(A::value(
                    "load_balancer_type",
                    json!("application"),
                    OneOf(&["application", "network", "gateway"]),
                )),
            CatalogEntry::new(ResourceKind::KeyValueTable, "aws_dynamodb_table")
                .attribute(A::new(
                    "name",
                    DefaultValue::Name(NameRule::underscored(3, 255, "table")),
                    pattern(r"^[A-Za-z0-9_.-]{3,255}$"),
                ))
                .attribute(A::value(
                    "billing_mode",
                    json!("PAY_PER_REQUEST"),
                    OneOf(&["PAY_PER_REQUEST", "PROVISIONED"]),
                ))
                .attribute(A::value("hash_key", json!("id"), NonEmpty)),
            CatalogEntry::new(ResourceKind::Queue, "aws_sqs_queue")
                .attribute(A::new(
                    "name",
                    DefaultValue::Name(NameRule::underscored(1, 80, "queue")),
                    pattern(r"^[A-Za-z0-9_-]{1,80}(\.fifo)?$"),
                ))
                .attribute(A::value("visibility_timeout_seconds", json!(30), Range(0, 43200)))
                .attribute(A::value("message_retention_seconds", json!(345600), Range(60, 1209600))),
            CatalogEntry::new(ResourceKind::InternetGateway, "aws_internet_gateway")
                .contained_in("vpc_id", ResourceKind::Vpc),
        ];

        Self { entries }
    }

    /// Look up the entry for a kind. Unsupported kinds have none.
    pub fn lookup(&self, kind: &ResourceKind) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| &e.kind == kind)
    }

    /// All entries in catalog order.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Terraform type name for a kind.
    pub fn terraform_type(&self, kind: &ResourceKind) -> Option<&'static str> {
        self.lookup(kind).map(|e| e.terraform_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hcl;

    #[test]
    fn test_parse_aliases() {
        assert_eq!(ResourceKind::parse("ec2"), ResourceKind::Instance);
        assert_eq!(ResourceKind::parse("S3"), ResourceKind::Bucket);
        assert_eq!(ResourceKind::parse("rds"), ResourceKind::Database);
        assert_eq!(ResourceKind::parse("aws_lambda_function"), ResourceKind::Function);
        assert_eq!(ResourceKind::parse("vpcGroup"), ResourceKind::Vpc);
        assert_eq!(ResourceKind::parse("security-group"), ResourceKind::SecurityGroup);
        assert_eq!(ResourceKind::parse("alb"), ResourceKind::LoadBalancer);
        assert_eq!(ResourceKind::parse("dynamodb"), ResourceKind::KeyValueTable);
        assert_eq!(ResourceKind::parse("gateway"), ResourceKind::InternetGateway);
        assert_eq!(
            ResourceKind::parse("kubernetes"),
            ResourceKind::Unsupported("kubernetes".to_string())
        );
    }

    #[test]
    fn test_kind_serde_uses_canonical_names() {
        let kind: ResourceKind = serde_json::from_str("\"sqs\"").unwrap();
        assert_eq!(kind, ResourceKind::Queue);
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"queue\"");

        let unknown: ResourceKind = serde_json::from_str("\"cdn\"").unwrap();
        assert_eq!(serde_json::to_string(&unknown).unwrap(), "\"cdn\"");
    }

    #[test]
    fn test_every_supported_kind_has_entry() {
        let catalog = Catalog::aws();
        for kind in ResourceKind::all() {
            let entry = catalog.lookup(&kind).unwrap();
            assert!(entry.terraform_type.starts_with("aws_"));
            assert_eq!(ResourceKind::parse(entry.terraform_type), kind);
        }
        assert!(catalog.lookup(&ResourceKind::Unsupported("cdn".into())).is_none());
    }

    /// Local name the compiler derives for a label.
    fn derived(label: &str) -> String {
        hcl::identifier(&hcl::local_name(label), "n1")
    }

    #[test]
    fn test_defaults_satisfy_constraints() {
        let long_label = "Very long label ".repeat(6);
        let labels = [
            "web_server_01",
            "A",
            "1 DB",
            "42",
            "!!",
            "Public Front Door Load Balancer Prod",
            long_label.as_str(),
        ];

        let catalog = Catalog::aws();
        for entry in catalog.entries() {
            for attribute in &entry.attributes {
                for label in labels {
                    if let Some(value) = attribute.default.resolve(&derived(label)) {
                        assert!(
                            attribute.constraint.check(&value),
                            "default for {}.{} is invalid for label {:?}: {}",
                            entry.terraform_type,
                            attribute.name,
                            label,
                            value
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_name_rule_shapes() {
        let bucket = NameRule::hyphenated(3, 63, "bucket");
        assert_eq!(bucket.apply(&derived("A")), "a-bucket");
        assert_eq!(bucket.apply(&derived("App Data")), "app-data");
        assert_eq!(bucket.apply(&derived(&"x".repeat(80))).len(), 63);

        let database = NameRule::hyphenated(1, 63, "db");
        assert_eq!(database.apply(&derived("1 DB")), "db-1-db");

        let balancer = NameRule::hyphenated(1, 32, "lb");
        assert_eq!(
            balancer.apply(&derived("Public Front Door Load Balancer Prod")),
            "public-front-door-load-balancer"
        );

        let table = NameRule::underscored(3, 255, "table");
        assert_eq!(table.apply(&derived("A")), "a_table");
        assert_eq!(table.apply(""), "table");
    }

    #[test]
    fn test_constraint_patterns_compile() {
        let catalog = Catalog::aws();
        for entry in catalog.entries() {
            for attribute in &entry.attributes {
                if let Constraint::Pattern(p) = &attribute.constraint {
                    assert!(p.is_valid(), "bad pattern {}", p.as_str());
                }
            }
        }
    }

    #[test]
    fn test_invalid_pattern_matches_nothing() {
        let broken = ValuePattern::new("([a-z");
        assert!(!broken.is_valid());
        assert!(!Constraint::Pattern(broken).check(&json!("abc")));
    }

    #[test]
    fn test_constraint_rejects_invalid_values() {
        assert!(!Constraint::Range(20, 65536).check(&json!(5)));
        assert!(!Constraint::Boolean.check(&json!("yes")));
        assert!(!Constraint::OneOf(&["gp2"]).check(&json!("gp9")));
        assert!(!Constraint::pattern(CIDR_PATTERN).check(&json!("10.0.0.0")));
        assert!(!Constraint::NonEmpty.check(&json!("  ")));
        assert!(Constraint::Any.check(&json!(null)));
    }
}
