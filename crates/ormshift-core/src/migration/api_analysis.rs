//! Inventory of route handlers and their query expressions.
//!
//! Handler sources are matched as text, not parsed. Every
//! `prisma.<model>.<operation>(` call is recorded and translated to the
//! destination query builder form when the operation is known. Anything else
//! gets a `/* MANUAL REVIEW: ... */` placeholder. Source files are never
//! rewritten.

use crate::catalog::SchemaBundle;
use crate::error::MigrationError;
use crate::report::RunLog;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const PHASE: Option<&str> = Some("api_analysis");

/// HTTP method of a route handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// `export function GET`.
    Get,
    /// `export function POST`.
    Post,
    /// `export function PUT`.
    Put,
    /// `export function DELETE`.
    Delete,
    /// Any other export, or a file with no exported handler.
    Unknown,
}

impl HttpMethod {
    /// Parse an exported handler name.
    pub fn parse(name: &str) -> Self {
        match name {
            "GET" => HttpMethod::Get,
            "POST" => HttpMethod::Post,
            "PUT" => HttpMethod::Put,
            "DELETE" => HttpMethod::Delete,
            _ => HttpMethod::Unknown,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
            HttpMethod::Put => write!(f, "PUT"),
            HttpMethod::Delete => write!(f, "DELETE"),
            HttpMethod::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Migration status of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointStatus {
    /// At least one expression needs manual review.
    Pending,
    /// Every expression has a translation.
    Migrated,
    /// Confirmed by a test run.
    Tested,
}

/// One route handler and its query expressions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiEndpointRecord {
    /// Endpoint path, e.g. `/api/posts/[id]`.
    pub path: String,
    /// Handler method.
    pub method: HttpMethod,
    /// Handler source file.
    pub file: PathBuf,
    /// Source query expressions in order of appearance.
    pub source_query_expressions: Vec<String>,
    /// Translations, index-aligned with the source expressions.
    pub translated_query_expressions: Vec<String>,
    /// Migration status.
    pub status: EndpointStatus,
}

impl ApiEndpointRecord {
    /// Number of expressions left for manual review.
    pub fn manual_review_count(&self) -> usize {
        self.translated_query_expressions
            .iter()
            .filter(|t| t.starts_with(MANUAL_REVIEW))
            .count()
    }

    /// Mark a migrated endpoint as tested. Pending endpoints stay pending.
    pub fn mark_tested(&mut self) -> bool {
        if self.status == EndpointStatus::Migrated {
            self.status = EndpointStatus::Tested;
        }
        self.status == EndpointStatus::Tested
    }
}

const MANUAL_REVIEW: &str = "/* MANUAL REVIEW:";

/// Translate one source query expression of the form `prisma.<model>.<op>(`.
///
/// Returns a manual review placeholder when the model is not in the schema or
/// the operation has no direct equivalent.
pub fn translate_expression(model: &str, operation: &str, schema: &SchemaBundle) -> String {
    let placeholder =
        |reason: &str| format!("{MANUAL_REVIEW} prisma.{model}.{operation}( {reason} */");

    let Some(entity) = schema.entity_for_model(model) else {
        return placeholder("unknown model");
    };
    let table = &entity.destination_table;

    match operation {
        "findMany" => format!("db.query.{table}.findMany("),
        "findUnique" | "findFirst" => format!("db.query.{table}.findFirst("),
        "create" | "createMany" => format!("db.insert({table}).values("),
        "update" | "updateMany" => format!("db.update({table}).set("),
        "delete" | "deleteMany" => format!("db.delete({table}).where("),
        "count" => format!("db.$count({table}, "),
        _ => placeholder("no direct equivalent"),
    }
}

/// Scans a directory of route handlers.
pub struct ApiAnalyzer {
    root: PathBuf,
    handler: Regex,
    query: Regex,
}

impl ApiAnalyzer {
    /// Create an analyzer for the directory at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, MigrationError> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| MigrationError::Config(format!("bad pattern: {e}")))
        };
        Ok(Self {
            root: root.into(),
            handler: compile(r"export\s+(?:async\s+)?function\s+([A-Za-z]+)\s*\(")?,
            query: compile(r"prisma\.(\w+)\.(\w+)\(")?,
        })
    }

    /// Analyze every `.ts`/`.js` file under the root.
    ///
    /// A missing root is a warning and yields no records.
    pub async fn analyze(
        &self,
        schema: &SchemaBundle,
        log: &RunLog,
    ) -> Result<Vec<ApiEndpointRecord>, MigrationError> {
        let is_dir = tokio::fs::metadata(&self.root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            log.warn(
                PHASE,
                format!("API directory {} not found, skipping", self.root.display()),
            )
            .await;
            return Ok(Vec::new());
        }

        let root = self.root.clone();
        let (files, walk_errors) = tokio::task::spawn_blocking(move || collect_sources(&root))
            .await
            .map_err(|e| MigrationError::Config(format!("API scan task failed: {e}")))?;
        for error in walk_errors {
            log.warn(PHASE, format!("skipping unreadable entry: {error}")).await;
        }

        let mut records = Vec::new();
        for file in files {
            let bytes = match tokio::fs::read(&file).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    log.warn(PHASE, format!("skipping {}: {e}", file.display()))
                        .await;
                    continue;
                }
            };
            let content = String::from_utf8_lossy(&bytes);
            let path = endpoint_path(&self.root, &file);
            records.extend(self.analyze_source(&path, &file, &content, schema));
        }

        let pending = records
            .iter()
            .filter(|r| r.status == EndpointStatus::Pending)
            .count();
        log.info(
            PHASE,
            format!(
                "{} endpoints analyzed, {} migrated, {} need manual review",
                records.len(),
                records.len() - pending,
                pending
            ),
        )
        .await;
        for record in records.iter().filter(|r| r.status == EndpointStatus::Pending) {
            log.warn(
                PHASE,
                format!(
                    "{} {}: {} expressions need manual review",
                    record.method,
                    record.path,
                    record.manual_review_count()
                ),
            )
            .await;
        }

        Ok(records)
    }

    /// Split one file by exported handler and collect its expressions.
    pub fn analyze_source(
        &self,
        path: &str,
        file: &Path,
        content: &str,
        schema: &SchemaBundle,
    ) -> Vec<ApiEndpointRecord> {
        let handlers: Vec<(usize, HttpMethod)> = self
            .handler
            .captures_iter(content)
            .filter_map(|c| Some((c.get(0)?.start(), HttpMethod::parse(c.get(1)?.as_str()))))
            .collect();

        let sections: Vec<(HttpMethod, &str)> = if handlers.is_empty() {
            if self.query.is_match(content) {
                vec![(HttpMethod::Unknown, content)]
            } else {
                Vec::new()
            }
        } else {
            handlers
                .iter()
                .enumerate()
                .map(|(idx, &(start, method))| {
                    let end = handlers.get(idx + 1).map_or(content.len(), |h| h.0);
                    (method, &content[start..end])
                })
                .collect()
        };

        sections
            .into_iter()
            .map(|(method, body)| {
                let mut sources = Vec::new();
                let mut translated = Vec::new();
                for caps in self.query.captures_iter(body) {
                    let (Some(whole), Some(model), Some(operation)) =
                        (caps.get(0), caps.get(1), caps.get(2))
                    else {
                        continue;
                    };
                    sources.push(whole.as_str().to_string());
                    translated.push(translate_expression(model.as_str(), operation.as_str(), schema));
                }
                let status = if translated.iter().any(|t| t.starts_with(MANUAL_REVIEW)) {
                    EndpointStatus::Pending
                } else {
                    EndpointStatus::Migrated
                };
                ApiEndpointRecord {
                    path: path.to_string(),
                    method,
                    file: file.to_path_buf(),
                    source_query_expressions: sources,
                    translated_query_expressions: translated,
                    status,
                }
            })
            .collect()
    }
}

/// Handler files under `root` in file-name order. Symlinks are not
/// followed. Entries that cannot be read are returned as messages.
fn collect_sources(root: &Path) -> (Vec<PathBuf>, Vec<String>) {
    let mut files = Vec::new();
    let mut errors = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        match entry {
            Ok(entry) => {
                let is_source = matches!(
                    entry.path().extension().and_then(|e| e.to_str()),
                    Some("ts") | Some("js")
                );
                if entry.file_type().is_file() && is_source {
                    files.push(entry.into_path());
                }
            }
            Err(e) => errors.push(e.to_string()),
        }
    }
    (files, errors)
}

/// Endpoint path for a handler file: `route.ts` maps to its directory,
/// any other file keeps its stem.
fn endpoint_path(root: &Path, file: &Path) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file);
    let mut segments: Vec<String> = relative
        .parent()
        .into_iter()
        .flat_map(|p| p.components())
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if let Some(stem) = file.file_stem().and_then(|s| s.to_str()) {
        if stem != "route" {
            segments.push(stem.to_string());
        }
    }

    if segments.is_empty() {
        "/api".to_string()
    } else {
        format!("/api/{}", segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::platform_schema;

    const POSTS_ROUTE: &str = r#"
import { prisma } from "@/lib/prisma";

export async function GET(req: Request) {
  const posts = await prisma.post.findMany({ include: { author: true } });
  const total = await prisma.post.count();
  return Response.json({ posts, total });
}

export async function POST(req: Request) {
  const body = await req.json();
  const post = await prisma.post.create({ data: body });
  await prisma.post.aggregate({ _avg: { likes: true } });
  return Response.json(post);
}
"#;

    #[test]
    fn test_translate_known_operations() {
        let schema = platform_schema();
        assert_eq!(
            translate_expression("post", "findMany", &schema),
            "db.query.posts.findMany("
        );
        assert_eq!(
            translate_expression("Profile", "findUnique", &schema),
            "db.query.profiles.findFirst("
        );
        assert_eq!(
            translate_expression("post", "create", &schema),
            "db.insert(posts).values("
        );
    }

    #[test]
    fn test_translate_unmatched_is_placeholder() {
        let schema = platform_schema();
        let unknown_op = translate_expression("post", "aggregate", &schema);
        assert!(unknown_op.starts_with("/* MANUAL REVIEW:"));
        assert!(unknown_op.contains("prisma.post.aggregate("));

        let unknown_model = translate_expression("widget", "findMany", &schema);
        assert!(unknown_model.contains("unknown model"));
    }

    #[test]
    fn test_split_by_handler() {
        let schema = platform_schema();
        let analyzer = ApiAnalyzer::new("unused").unwrap();
        let records =
            analyzer.analyze_source("/api/posts", Path::new("route.ts"), POSTS_ROUTE, &schema);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].method, HttpMethod::Get);
        assert_eq!(
            records[0].source_query_expressions,
            vec!["prisma.post.findMany(", "prisma.post.count("]
        );
        assert_eq!(records[0].status, EndpointStatus::Migrated);

        assert_eq!(records[1].method, HttpMethod::Post);
        assert_eq!(records[1].status, EndpointStatus::Pending);
        assert_eq!(records[1].manual_review_count(), 1);
    }

    #[test]
    fn test_mark_tested_only_from_migrated() {
        let schema = platform_schema();
        let analyzer = ApiAnalyzer::new("unused").unwrap();
        let mut records =
            analyzer.analyze_source("/api/posts", Path::new("route.ts"), POSTS_ROUTE, &schema);

        assert!(records[0].mark_tested());
        assert_eq!(records[0].status, EndpointStatus::Tested);
        assert!(!records[1].mark_tested());
        assert_eq!(records[1].status, EndpointStatus::Pending);
    }

    #[test]
    fn test_endpoint_path() {
        let root = Path::new("/app/src/app/api");
        assert_eq!(
            endpoint_path(root, Path::new("/app/src/app/api/posts/[id]/route.ts")),
            "/api/posts/[id]"
        );
        assert_eq!(endpoint_path(root, Path::new("/app/src/app/api/route.ts")), "/api");
        assert_eq!(
            endpoint_path(root, Path::new("/app/src/app/api/auth/helpers.js")),
            "/api/auth/helpers"
        );
    }

    #[tokio::test]
    async fn test_analyze_directory() {
        let dir = tempfile::tempdir().unwrap();
        let posts = dir.path().join("posts");
        std::fs::create_dir_all(&posts).unwrap();
        std::fs::write(posts.join("route.ts"), POSTS_ROUTE).unwrap();
        std::fs::write(dir.path().join("README.md"), "prisma.post.findMany(").unwrap();

        let analyzer = ApiAnalyzer::new(dir.path()).unwrap();
        let records = analyzer
            .analyze(&platform_schema(), &RunLog::disabled())
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.path == "/api/posts"));
    }

    #[tokio::test]
    async fn test_missing_directory_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = ApiAnalyzer::new(dir.path().join("nope")).unwrap();
        let records = analyzer
            .analyze(&platform_schema(), &RunLog::disabled())
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_symlink_cycle_is_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        let posts = dir.path().join("posts");
        std::fs::create_dir_all(&posts).unwrap();
        std::fs::write(posts.join("route.ts"), POSTS_ROUTE).unwrap();
        #[cfg(unix)]
        std::os::unix::fs::symlink(dir.path(), posts.join("loop")).unwrap();

        let analyzer = ApiAnalyzer::new(dir.path()).unwrap();
        let records = analyzer
            .analyze(&platform_schema(), &RunLog::disabled())
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.file == posts.join("route.ts")));
    }

    #[tokio::test]
    async fn test_non_utf8_file_is_analyzed_lossily() {
        let dir = tempfile::tempdir().unwrap();
        let mut legacy = b"\xff\xfe export async function GET() {\n".to_vec();
        legacy.extend_from_slice(b"  return prisma.post.findMany({});\n}\n");
        std::fs::write(dir.path().join("legacy.js"), legacy).unwrap();
        std::fs::write(dir.path().join("junk.ts"), b"\xff\xfe").unwrap();

        let analyzer = ApiAnalyzer::new(dir.path()).unwrap();
        let records = analyzer
            .analyze(&platform_schema(), &RunLog::disabled())
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, "/api/legacy");
        assert_eq!(records[0].method, HttpMethod::Get);
        assert_eq!(records[0].source_query_expressions, vec!["prisma.post.findMany("]);
    }
}
