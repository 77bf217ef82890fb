//! MCP server implementation using rmcp over stdio transport.
//!
//! Every tool runs its synchronous handler on the blocking pool under the
//! configured operation timeout and answers with a JSON [`Envelope`].

use std::sync::Arc;
use std::time::Duration;

use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    Annotated, CallToolRequestParams, CallToolResult, GetPromptRequestParams, GetPromptResult,
    ListPromptsResult, ListResourcesResult, ListToolsResult, PaginatedRequestParams, Prompt,
    PromptArgument, PromptMessage, PromptMessageRole, RawResource, ReadResourceRequestParams,
    ReadResourceResult, ResourceContents, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{tool, tool_router, ErrorData as McpError, ServerHandler, ServiceExt};
use serde::Deserialize;
use serde_json::Value;

use crate::compat::guide::{QUICK_REFERENCE, QUICK_REFERENCE_URI};
use crate::error::{MigrateError, Result};

use super::envelope::Envelope;
use super::{tools_analysis, tools_convert, ToolContext};

// ---------------------------------------------------------------------------
// Server struct
// ---------------------------------------------------------------------------

/// Migration MCP server. Cheap to clone; all clones share one context.
#[derive(Clone, Debug)]
pub struct MigrationServer {
    ctx: Arc<ToolContext>,
}

impl MigrationServer {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    pub fn context(&self) -> &ToolContext {
        &self.ctx
    }

    /// Run `f` on the blocking pool, bounded by the operation timeout.
    pub(crate) async fn execute<F>(&self, f: F) -> Result<Value>
    where
        F: FnOnce(&ToolContext) -> Result<Value> + Send + 'static,
    {
        let ctx = Arc::clone(&self.ctx);
        let seconds = ctx.config.limits.timeout_seconds;
        let task = tokio::task::spawn_blocking(move || f(&ctx));
        match tokio::time::timeout(Duration::from_secs(seconds), task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(MigrateError::Io(std::io::Error::other(format!(
                "tool task failed: {join}"
            )))),
            Err(_) => {
                tracing::warn!(seconds, "tool timed out");
                Err(MigrateError::Timeout { seconds })
            }
        }
    }

    async fn run<F>(&self, tool: &'static str, f: F) -> String
    where
        F: FnOnce(&ToolContext) -> Result<Value> + Send + 'static,
    {
        tracing::debug!(tool, "tool call");
        let result = self.execute(f).await;
        Envelope::from_result(tool, result, self.ctx.metadata()).to_json()
    }

    /// Whether `name` is enabled under the current preset and overrides.
    pub fn is_enabled(&self, name: &str) -> bool {
        super::registry::enabled_tool_names(&self.ctx.config).contains(name)
    }

    /// Tools listed to clients: every routed tool the preset enables.
    pub fn visible_tools(&self) -> Vec<Tool> {
        let enabled = super::registry::enabled_tool_names(&self.ctx.config);
        Self::tool_router()
            .list_all()
            .into_iter()
            .filter(|t| enabled.contains(t.name.as_ref()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tool parameter structs
// ---------------------------------------------------------------------------

#[derive(Deserialize, schemars::JsonSchema)]
pub(crate) struct AnalyzeCodeParams {
    #[schemars(description = "Python source code to analyze")]
    pub code: String,
    #[schemars(description = "Label used as the file name in findings (default '<input>')")]
    pub file_name: Option<String>,
}

#[derive(Deserialize, schemars::JsonSchema)]
pub(crate) struct CodeParams {
    #[schemars(description = "Python source code")]
    pub code: String,
}

#[derive(Deserialize, schemars::JsonSchema)]
pub(crate) struct ScanCompatParams {
    #[schemars(description = "File paths to scan, relative to the server's working directory")]
    pub files: Vec<String>,
}

#[derive(Deserialize, schemars::JsonSchema)]
pub(crate) struct DirectoryParams {
    #[schemars(description = "Directory to scan recursively")]
    pub directory: String,
    #[schemars(description = "Include globs (default ['**/*.py'])")]
    pub include: Option<Vec<String>>,
    #[schemars(description = "Extra exclude globs, added to the configured ones")]
    pub exclude: Option<Vec<String>>,
}

#[derive(Deserialize, schemars::JsonSchema)]
pub(crate) struct ReportParams {
    #[schemars(description = "Directory of the project to plan")]
    pub directory: String,
}

#[derive(Deserialize, schemars::JsonSchema)]
pub(crate) struct FileParams {
    #[schemars(description = "Path of a Python file")]
    pub file_path: String,
}

#[derive(Deserialize, schemars::JsonSchema)]
pub(crate) struct ConvertFileParams {
    #[schemars(description = "Path of the .py file to convert in place")]
    pub file_path: String,
    #[schemars(description = "Write <file>.py2.bak before converting (default true)")]
    pub backup: Option<bool>,
    #[schemars(description = "Report per-line changes without writing anything (default false)")]
    pub dry_run: Option<bool>,
}

#[derive(Deserialize, schemars::JsonSchema)]
pub(crate) struct CompareParams {
    #[schemars(description = "Path of the original Python 2 file (e.g. the .py2.bak backup)")]
    pub original_path: String,
    #[schemars(description = "Path of the converted file")]
    pub converted_path: String,
}

#[derive(Deserialize, schemars::JsonSchema)]
pub(crate) struct GuideParams {
    #[schemars(
        description = "Topic: print, unicode, dict_methods, exceptions, division or imports"
    )]
    pub topic: String,
}

#[derive(Deserialize, schemars::JsonSchema)]
pub(crate) struct ListRulesParams {
    #[schemars(description = "Only rules of this category (e.g. 'iterators', 'division')")]
    pub category: Option<String>,
}

// ---------------------------------------------------------------------------
// Tool implementations
// ---------------------------------------------------------------------------

#[tool_router]
impl MigrationServer {
    #[tool(
        name = "analyze_py2_code",
        description = "Find Python 2 constructs in a code snippet. Returns located findings with rule ids, severities and suggested fixes, plus constructs that need human review after conversion."
    )]
    async fn analyze_py2_code(&self, Parameters(p): Parameters<AnalyzeCodeParams>) -> String {
        self.run("analyze_py2_code", move |ctx| {
            tools_analysis::handle_analyze_code(ctx, &p.code, p.file_name.as_deref())
        })
        .await
    }

    #[tool(
        name = "scan_compat",
        description = "Scan a list of files for Python 2 constructs. Unreadable files are reported as read errors, never as clean."
    )]
    async fn scan_compat(&self, Parameters(p): Parameters<ScanCompatParams>) -> String {
        self.run("scan_compat", move |ctx| {
            tools_analysis::handle_scan_compat(ctx, &p.files)
        })
        .await
    }

    #[tool(
        name = "analyze_directory",
        description = "Scan every Python file under a directory (virtualenvs, caches and backups excluded). Fails without scanning when the file limit is exceeded."
    )]
    async fn analyze_directory(&self, Parameters(p): Parameters<DirectoryParams>) -> String {
        self.run("analyze_directory", move |ctx| {
            tools_analysis::handle_analyze_directory(ctx, &p.directory, p.include, p.exclude)
        })
        .await
    }

    #[tool(
        name = "migration_report",
        description = "Migration plan for a directory: weighted effort, time estimate, category and severity histograms, and files bucketed into quick wins, high density and major refactors."
    )]
    async fn migration_report(&self, Parameters(p): Parameters<ReportParams>) -> String {
        self.run("migration_report", move |ctx| {
            tools_analysis::handle_migration_report(ctx, &p.directory)
        })
        .await
    }

    #[tool(
        name = "convert_file",
        description = "Convert a .py file in place through the configured rewrite engine. Writes a verified <file>.py2.bak backup first and reports the fix rate and residual findings."
    )]
    async fn convert_file(&self, Parameters(p): Parameters<ConvertFileParams>) -> String {
        self.run("convert_file", move |ctx| {
            tools_convert::handle_convert_file(ctx, &p.file_path, p.backup, p.dry_run)
        })
        .await
    }

    #[tool(
        name = "validate_conversion",
        description = "Validate a converted file: Python 3 syntax, remaining Python 2 patterns, review hazards (division, encodings, pickle) and test recommendations. Compares against the .py2.bak backup when present."
    )]
    async fn validate_conversion(&self, Parameters(p): Parameters<FileParams>) -> String {
        self.run("validate_conversion", move |ctx| {
            tools_analysis::handle_validate(ctx, &p.file_path)
        })
        .await
    }

    #[tool(
        name = "conversion_report",
        description = "Compare an original file with its converted version: fixed and remaining findings per rule, lines added and removed, syntax validity and next steps."
    )]
    async fn conversion_report(&self, Parameters(p): Parameters<CompareParams>) -> String {
        self.run("conversion_report", move |ctx| {
            tools_analysis::handle_conversion_report(ctx, &p.original_path, &p.converted_path)
        })
        .await
    }

    #[tool(
        name = "convert_print_statements",
        description = "Rewrite print statements in a snippet as print() calls, including trailing commas and >>file redirection."
    )]
    async fn convert_print_statements(&self, Parameters(p): Parameters<CodeParams>) -> String {
        self.run("convert_print_statements", move |ctx| {
            tools_convert::handle_convert_print(ctx, &p.code)
        })
        .await
    }

    #[tool(
        name = "run_2to3",
        description = "Run the configured rewrite engine (2to3 by default) on a snippet and return the converted code with any remaining findings."
    )]
    async fn run_2to3(&self, Parameters(p): Parameters<CodeParams>) -> String {
        self.run("run_2to3", move |ctx| tools_convert::handle_run_engine(ctx, &p.code))
            .await
    }

    #[tool(
        name = "check_syntax",
        description = "Check whether code parses as Python 3 and locate the first syntax error."
    )]
    async fn check_syntax(&self, Parameters(p): Parameters<CodeParams>) -> String {
        self.run("check_syntax", move |ctx| {
            tools_analysis::handle_check_syntax(ctx, &p.code)
        })
        .await
    }

    #[tool(
        name = "get_migration_guide",
        description = "Markdown migration guide for one topic: print, unicode, dict_methods, exceptions, division or imports."
    )]
    async fn get_migration_guide(&self, Parameters(p): Parameters<GuideParams>) -> String {
        self.run("get_migration_guide", move |_| tools_analysis::handle_guide(&p.topic))
            .await
    }

    #[tool(
        name = "list_rules",
        description = "List the compatibility rules and review-hazard rules, optionally for one category."
    )]
    async fn list_rules(&self, Parameters(p): Parameters<ListRulesParams>) -> String {
        self.run("list_rules", move |_| {
            tools_analysis::handle_list_rules(p.category.as_deref())
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// ServerHandler impl: manual list_tools/call_tool for preset filtering
// ---------------------------------------------------------------------------

impl ServerHandler for MigrationServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Python 2 to 3 migration server. Start with migration_report on a directory, \
                 then convert_file (dry_run first) and validate_conversion per file. \
                 Findings are lexical; review hazards need human judgment."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .enable_prompts()
                .build(),
            server_info: rmcp::model::Implementation {
                name: "pymigrate".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = std::result::Result<ListResourcesResult, McpError>> + Send + '_
    {
        let resources = vec![Annotated::new(
            RawResource {
                uri: QUICK_REFERENCE_URI.into(),
                name: "Python 2 to 3 Quick Reference".into(),
                title: None,
                description: Some(
                    "The most common Python 2 to 3 changes and the __future__ imports.".into(),
                ),
                mime_type: Some("text/markdown".into()),
                size: None,
                icons: None,
                meta: None,
            },
            None,
        )];
        std::future::ready(Ok(ListResourcesResult {
            meta: None,
            next_cursor: None,
            resources,
        }))
    }

    fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = std::result::Result<ReadResourceResult, McpError>> + Send + '_
    {
        let result = match request.uri.as_str() {
            QUICK_REFERENCE_URI => Ok(ReadResourceResult {
                contents: vec![ResourceContents::text(QUICK_REFERENCE, QUICK_REFERENCE_URI)],
            }),
            uri => Err(McpError::resource_not_found(
                format!("Unknown resource: {uri}"),
                None,
            )),
        };
        std::future::ready(result)
    }

    fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = std::result::Result<ListPromptsResult, McpError>> + Send + '_
    {
        let prompts = vec![Prompt::new(
            "plan-migration",
            Some("Plan and carry out the Python 3 migration of a directory, file by file."),
            Some(vec![PromptArgument {
                name: "directory".into(),
                title: None,
                description: Some("Project directory to migrate".into()),
                required: Some(true),
            }]),
        )];
        std::future::ready(Ok(ListPromptsResult {
            meta: None,
            next_cursor: None,
            prompts,
        }))
    }

    fn get_prompt(
        &self,
        request: GetPromptRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = std::result::Result<GetPromptResult, McpError>> + Send + '_
    {
        let args = request.arguments.unwrap_or_default();
        let result = match request.name.as_str() {
            "plan-migration" => {
                let directory = args
                    .get("directory")
                    .and_then(|v| v.as_str())
                    .unwrap_or(".");
                Ok(plan_migration_prompt(directory))
            }
            name => Err(McpError::invalid_params(
                format!("Unknown prompt: {name}"),
                None,
            )),
        };
        std::future::ready(result)
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = std::result::Result<ListToolsResult, McpError>> + Send + '_
    {
        std::future::ready(Ok(ListToolsResult {
            meta: None,
            next_cursor: None,
            tools: self.visible_tools(),
        }))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> std::result::Result<CallToolResult, McpError> {
        if !self.is_enabled(request.name.as_ref()) {
            return Ok(CallToolResult::error(vec![rmcp::model::Content::text(
                disabled_message(request.name.as_ref(), &self.ctx.config.preset.to_string()),
            )]));
        }
        let tool_context =
            rmcp::handler::server::tool::ToolCallContext::new(self, request, context);
        Self::tool_router().call(tool_context).await
    }
}

fn disabled_message(tool: &str, preset: &str) -> String {
    format!(
        "Tool '{tool}' is not available in the current preset ({preset}). \
         Change the preset in .pymigrate.yaml or set PYMIGRATE_PRESET=full to enable all tools."
    )
}

fn plan_migration_prompt(directory: &str) -> GetPromptResult {
    GetPromptResult {
        description: Some("Python 3 migration workflow".into()),
        messages: vec![PromptMessage::new_text(
            PromptMessageRole::User,
            format!(
                "Migrate the Python project in `{directory}` to Python 3. Follow these steps:\n\n\
                 1. Call `migration_report` with directory=\"{directory}\" and summarize the effort estimate.\n\
                 2. Work through `quick_wins` first, then `high_density`, then `major_refactors`.\n\
                 3. For each file, call `convert_file` with dry_run=true and review the changes, then call it again without dry_run.\n\
                 4. Call `validate_conversion` on the converted file. Resolve residual findings and go through every review hazard.\n\
                 5. Use `get_migration_guide` for topics that keep coming up and follow the test recommendations."
            ),
        )],
    }
}

// ---------------------------------------------------------------------------
// Public entry point: run the MCP server over stdio
// ---------------------------------------------------------------------------

/// Start the MCP server on stdin/stdout.
///
/// Blocks until the client disconnects or Ctrl-C is received.
pub async fn run_server(ctx: ToolContext) -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        base = %ctx.base.display(),
        preset = %ctx.config.preset,
        engine = ctx.rewriter.name(),
        "starting MCP server on stdio"
    );
    let server = MigrationServer::new(ctx);
    let transport = rmcp::transport::io::stdio();
    let running = server.serve(transport).await.inspect_err(|e| {
        tracing::error!("MCP server error: {}", e);
    })?;
    tokio::select! {
        _ = running.waiting() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received, shutting down");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
