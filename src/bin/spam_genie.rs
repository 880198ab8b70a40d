//! SpamGenie CLI
//!
//! Command-line front end for the SpamGenie rule service: manage workspaces,
//! sharing and prompt templates, upload sample emails and run the rule
//! generation wizard end to end.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Confirm};
use indicatif::{ProgressBar, ProgressStyle};
use spam_genie::api::TemplateFilter;
use spam_genie::wizard::WizardOptions;
use spam_genie::{
    AppState, CandidateFile, FileStateStore, HttpBackend, NewTemplate, Permission, Role, Session,
    Settings, SpamGenieApi, Step, TemplateKind, TemplateService, UserService, Visibility, Wizard,
    Workspace, WorkspaceAccess, WorkspaceService,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "spam-genie")]
#[command(about = "SpamGenie CLI - Generate SpamAssassin rules from sample emails")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ./spam-genie.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend URL
    #[arg(long, global = true, env = "SPAM_GENIE_BASE_URL")]
    base_url: Option<String>,

    /// API token
    #[arg(long, global = true, env = "SPAM_GENIE_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the signed-in user and their role
    Whoami,

    /// Workspace management
    Workspace {
        #[command(subcommand)]
        action: WorkspaceCommands,
    },

    /// Upload .eml samples to a workspace
    Upload {
        /// Files to upload; files without the accepted extension are skipped
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Workspace id or name (defaults to the current workspace)
        #[arg(short, long)]
        workspace: Option<String>,
    },

    /// List the samples of a workspace
    Samples {
        #[arg(short, long)]
        workspace: Option<String>,
    },

    /// Delete one sample
    DeleteSample {
        id: i64,

        #[arg(short, long)]
        workspace: Option<String>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show the headers found across a workspace's samples
    Headers {
        #[arg(short, long)]
        workspace: Option<String>,
    },

    /// Prompt template management
    Templates {
        #[command(subcommand)]
        action: TemplateCommands,
    },

    /// User administration (admins only)
    Users {
        #[command(subcommand)]
        action: UserCommands,
    },

    /// Run the wizard: upload, select headers, assemble the prompt, generate a rule
    Generate {
        #[arg(short, long)]
        workspace: Option<String>,

        /// Samples to upload first
        #[arg(short, long)]
        files: Vec<PathBuf>,

        /// Headers to include (comma separated); defaults to the common spam headers
        #[arg(long, value_delimiter = ',')]
        headers: Vec<String>,

        /// Include every available header
        #[arg(long, conflicts_with = "headers")]
        all_headers: bool,

        /// Base prompt template id
        #[arg(long)]
        base: Option<i64>,

        /// Prompt module ids, in order
        #[arg(long = "module")]
        modules: Vec<i64>,

        /// Send this file's text instead of the assembled prompt
        #[arg(long)]
        prompt_file: Option<PathBuf>,

        /// Ask for a revision of the newest rule
        #[arg(long)]
        feedback: Option<String>,
    },

    /// List generated rules, newest first
    Results {
        #[arg(short, long)]
        workspace: Option<String>,

        /// Print the full rule text
        #[arg(long)]
        full: bool,
    },
}

#[derive(Subcommand)]
enum WorkspaceCommands {
    /// List workspaces you own or that are shared with you
    List,

    /// Create a workspace and make it current
    Create {
        name: String,

        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Make a workspace current
    Use { workspace: String },

    /// Delete a workspace with all its samples and rules
    Delete {
        workspace: String,

        #[arg(short, long)]
        yes: bool,
    },

    /// Share a workspace with another user
    Share {
        workspace: String,

        /// Username or email
        user: String,

        #[arg(short, long, default_value = "read")]
        permission: Permission,
    },

    /// Remove a user's access
    Unshare { workspace: String, user_id: i64 },

    /// Find users to share with
    Search { query: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    All,
    Base,
    Modules,
}

#[derive(Subcommand)]
enum TemplateCommands {
    /// List the templates visible to you
    List {
        #[arg(long, value_enum, default_value = "all")]
        kind: KindArg,
    },

    /// Create a template
    Create {
        #[arg(long)]
        name: String,

        /// File holding the template body
        #[arg(long)]
        file: PathBuf,

        #[arg(long, default_value = "")]
        description: String,

        /// global, user_workspaces or workspace
        #[arg(long, default_value = "workspace")]
        visibility: Visibility,

        /// Create a base prompt
        #[arg(long, conflicts_with = "module_type")]
        base: bool,

        /// Create a module of this type
        #[arg(long)]
        module_type: Option<String>,

        /// Workspace for workspace-visible templates (defaults to the current one)
        #[arg(short, long)]
        workspace: Option<String>,
    },

    /// Delete a template
    Delete {
        id: i64,

        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// List users, optionally only those with a role
    List {
        /// normal, power_user or admin
        #[arg(long)]
        role: Option<Role>,
    },

    /// Assign a role to a user
    SetRole {
        /// User id or username
        user: String,

        /// normal, power_user or admin
        role: Role,

        #[arg(short, long)]
        yes: bool,
    },
}

/// Everything a command needs
struct App {
    settings: Settings,
    api: Arc<dyn SpamGenieApi>,
    session: Session,
    store: FileStateStore,
    state: AppState,
}

impl App {
    fn settings(cli: &Cli) -> Result<Settings> {
        let mut settings = Settings::load(cli.config.as_deref())?;
        if let Some(url) = &cli.base_url {
            settings.base_url = url.clone();
        }
        if let Some(token) = &cli.token {
            settings.api_token = Some(token.clone());
        }
        settings.validate()?;
        Ok(settings)
    }

    async fn connect(settings: Settings) -> Result<Self> {
        let api: Arc<dyn SpamGenieApi> = Arc::new(HttpBackend::from_settings(&settings)?);
        let session = Session::establish(&api)
            .await
            .with_context(|| format!("Could not reach {}", settings.base_url))?;
        let store = FileStateStore::new(settings.state_file()?);
        let state = AppState::hydrate(&store)?;

        Ok(Self {
            settings,
            api,
            session,
            store,
            state,
        })
    }

    fn workspaces(&self) -> WorkspaceService {
        WorkspaceService::new(Arc::clone(&self.api), self.session.clone())
    }

    fn templates(&self) -> TemplateService {
        TemplateService::new(Arc::clone(&self.api), self.session.clone())
    }

    fn users(&self) -> UserService {
        UserService::new(Arc::clone(&self.api), self.session.clone())
    }

    /// The named workspace, or the current one
    async fn workspace(&self, requested: Option<&str>) -> Result<(Workspace, WorkspaceAccess)> {
        let key = match requested {
            Some(key) => key.to_string(),
            None => self
                .state
                .current_workspace
                .map(|id| id.to_string())
                .ok_or_else(|| {
                    anyhow!("No workspace selected. Use --workspace or `spam-genie workspace use <name>`")
                })?,
        };
        let service = self.workspaces();
        let workspace = service.find(&key).await?;
        let access = service.access(&workspace)?;
        Ok((workspace, access))
    }

    fn save_state(&self) -> Result<()> {
        self.state.persist(&self.store)?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let settings = App::settings(&cli)?;

    // Initialize logging
    let log_level = if cli.verbose {
        "debug"
    } else {
        settings.log_level.as_str()
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(log_level))
        .with_target(false)
        .init();

    let mut ctx = App::connect(settings).await?;

    match cli.command {
        Commands::Whoami => {
            let user = &ctx.session.user;
            println!("👤 {} <{}>", user.username.bold(), user.email);
            println!("   Role: {}", user.role);
            let mut caps: Vec<String> = ctx
                .session
                .capabilities
                .iter()
                .map(|c| format!("{:?}", c))
                .collect();
            caps.sort();
            if !caps.is_empty() {
                println!("   Capabilities: {}", caps.join(", "));
            }
        }

        Commands::Workspace { action } => workspace_command(&mut ctx, action).await?,

        Commands::Upload { files, workspace } => {
            let (workspace, access) = ctx.workspace(workspace.as_deref()).await?;
            let mut wizard = open_wizard(&ctx, workspace, access, true).await?;
            upload_files(&mut wizard, &files).await?;
        }

        Commands::Samples { workspace } => {
            let (workspace, _) = ctx.workspace(workspace.as_deref()).await?;
            let samples = ctx.api.list_samples(workspace.id).await?;
            println!("\n📧 Samples in '{}' ({})", workspace.name, samples.len());
            println!("=====================================");
            for sample in samples {
                println!(
                    "  {:>6}  {}  {}",
                    sample.id,
                    sample.uploaded_at.format("%Y-%m-%d %H:%M"),
                    sample.original_filename
                );
            }
        }

        Commands::DeleteSample { id, workspace, yes } => {
            let (workspace, access) = ctx.workspace(workspace.as_deref()).await?;
            if !confirm(&format!("Delete sample {}?", id), yes)? {
                return Ok(());
            }
            let mut wizard = open_wizard(&ctx, workspace, access, false).await?;
            wizard.delete_sample(id).await?;
            println!("{} Deleted sample {}", "✓".green(), id);
        }

        Commands::Headers { workspace } => {
            let (workspace, access) = ctx.workspace(workspace.as_deref()).await?;
            let wizard = open_wizard(&ctx, workspace, access, false).await?;
            print_headers(&wizard);
        }

        Commands::Templates { action } => template_command(&ctx, action).await?,

        Commands::Users { action } => user_command(&ctx, action).await?,

        Commands::Generate {
            workspace,
            files,
            headers,
            all_headers,
            base,
            modules,
            prompt_file,
            feedback,
        } => {
            let (workspace, access) = ctx.workspace(workspace.as_deref()).await?;
            let is_new =
                ctx.state.current_workspace == Some(workspace.id) && ctx.state.take_new_workspace_flag();
            ctx.save_state()?;

            let mut wizard = open_wizard(&ctx, workspace, access, is_new).await?;
            let options = GenerateOptions {
                files,
                headers,
                all_headers,
                base,
                modules,
                prompt_file,
                feedback,
            };
            run_generate(&ctx, &mut wizard, options).await?;
        }

        Commands::Results { workspace, full } => {
            let (workspace, _) = ctx.workspace(workspace.as_deref()).await?;
            let results = ctx.api.list_generations(workspace.id).await?;
            println!("\n📏 Rules in '{}' ({})", workspace.name, results.len());
            println!("=====================================");
            if results.is_empty() {
                println!("No rules generated yet.");
            }
            for result in results {
                let status = if result.is_complete {
                    "complete".green()
                } else {
                    "pending".yellow()
                };
                println!(
                    "🔧 #{} {} [{}]",
                    result.id,
                    result.created_at.format("%Y-%m-%d %H:%M"),
                    status
                );
                if let Some(rule) = &result.rule {
                    if full {
                        println!("{}\n", rule);
                    } else {
                        println!("   {}", rule.lines().next().unwrap_or_default());
                    }
                }
            }
        }
    }

    Ok(())
}

async fn open_wizard(
    ctx: &App,
    workspace: Workspace,
    access: WorkspaceAccess,
    is_new: bool,
) -> Result<Wizard> {
    let wizard = Wizard::open(
        Arc::clone(&ctx.api),
        workspace,
        access,
        WizardOptions::from(&ctx.settings),
        is_new,
    )
    .await?;
    Ok(wizard)
}

fn confirm(prompt: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    let confirmed = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()?;
    Ok(confirmed)
}

async fn workspace_command(ctx: &mut App, action: WorkspaceCommands) -> Result<()> {
    let service = ctx.workspaces();
    match action {
        WorkspaceCommands::List => {
            let workspaces = service.list().await?;
            println!("\n📂 Workspaces ({})", workspaces.len());
            println!("=====================================");
            if workspaces.is_empty() {
                println!("No workspaces found.");
            }
            for workspace in workspaces {
                let marker = if ctx.state.current_workspace == Some(workspace.id) {
                    "*".green().bold()
                } else {
                    " ".normal()
                };
                let access = match service.access(&workspace) {
                    Ok(WorkspaceAccess::Owner) => "owner".to_string(),
                    Ok(WorkspaceAccess::Shared(permission)) => {
                        format!("shared by {} ({})", workspace.owner.username, permission)
                    }
                    Err(_) => "no access".to_string(),
                };
                println!("{} {:>5}  {:<25}  {}", marker, workspace.id, workspace.name, access);
                for share in &workspace.shares {
                    println!("          ↳ {} ({})", share.username, share.permission);
                }
            }
        }

        WorkspaceCommands::Create { name, description } => {
            let workspace = service.create(&name, &description).await?;
            ctx.state.select_workspace(&workspace, true);
            ctx.save_state()?;
            println!(
                "{} Created workspace '{}' ({}) and made it current",
                "✓".green(),
                workspace.name,
                workspace.id
            );
        }

        WorkspaceCommands::Use { workspace } => {
            let workspace = service.find(&workspace).await?;
            ctx.state.select_workspace(&workspace, false);
            ctx.save_state()?;
            println!("{} Now using '{}'", "✓".green(), workspace.name);
        }

        WorkspaceCommands::Delete { workspace, yes } => {
            let workspace = service.find(&workspace).await?;
            let prompt = format!(
                "Delete workspace '{}' with all its samples and rules?",
                workspace.name
            );
            if !confirm(&prompt, yes)? {
                return Ok(());
            }
            service.delete(&workspace).await?;
            ctx.state.forget_workspace(workspace.id);
            ctx.save_state()?;
            println!("{} Deleted workspace '{}'", "✓".green(), workspace.name);
        }

        WorkspaceCommands::Share {
            workspace,
            user,
            permission,
        } => {
            let workspace = service.find(&workspace).await?;
            let share = service.share(&workspace, &user, permission).await?;
            println!(
                "{} Shared '{}' with {} ({})",
                "✓".green(),
                workspace.name,
                share.username,
                share.permission
            );
        }

        WorkspaceCommands::Unshare { workspace, user_id } => {
            let workspace = service.find(&workspace).await?;
            service.unshare(&workspace, user_id).await?;
            println!("{} Removed user {} from '{}'", "✓".green(), user_id, workspace.name);
        }

        WorkspaceCommands::Search { query } => {
            let users = service.search_users(&query).await?;
            if users.is_empty() {
                println!("No users found (queries need at least 2 characters).");
            }
            for user in users {
                println!("  {:>5}  {}", user.id, user.username);
            }
        }
    }
    Ok(())
}

async fn user_command(ctx: &App, action: UserCommands) -> Result<()> {
    let service = ctx.users();
    match action {
        UserCommands::List { role } => {
            let users = service.list(role).await?;
            if users.is_empty() {
                println!("No users found.");
            }
            for user in users {
                println!(
                    "  {:>5}  {:<20} {:<30} {}",
                    user.id,
                    user.username.bold(),
                    user.email,
                    user.role
                );
            }
        }

        UserCommands::SetRole { user, role, yes } => {
            let user = service.find(&user).await?;
            if user.role == role {
                println!("'{}' is already {}", user.username, role);
                return Ok(());
            }
            if user.id == ctx.session.user.id && role != Role::Admin {
                warn!("Removing your own admin role");
            }
            if !confirm(
                &format!("Change '{}' from {} to {}?", user.username, user.role, role),
                yes,
            )? {
                return Ok(());
            }
            let updated = service.set_role(&user, role).await?;
            println!("{} '{}' is now {}", "✓".green(), updated.username, updated.role);
        }
    }
    Ok(())
}

async fn template_command(ctx: &App, action: TemplateCommands) -> Result<()> {
    let service = ctx.templates();
    match action {
        TemplateCommands::List { kind } => {
            let filter = match kind {
                KindArg::All => TemplateFilter::All,
                KindArg::Base => TemplateFilter::Base,
                KindArg::Modules => TemplateFilter::Modules,
            };
            let templates = service.list_visible(filter).await?;
            println!("\n📝 Templates ({})", templates.len());
            println!("=====================================");
            for template in templates {
                let kind = match &template.kind {
                    TemplateKind::Base => "base".to_string(),
                    TemplateKind::Module { module_type } => format!("module:{}", module_type),
                    TemplateKind::Workspace => "workspace".to_string(),
                };
                println!(
                    "  {:>5}  {:<30}  {:<20}  {}",
                    template.id, template.name, kind, template.visibility
                );
            }
        }

        TemplateCommands::Create {
            name,
            file,
            description,
            visibility,
            base,
            module_type,
            workspace,
        } => {
            let body = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Could not read {}", file.display()))?;
            let workspace_id = if visibility == Visibility::Workspace {
                Some(ctx.workspace(workspace.as_deref()).await?.0.id)
            } else {
                None
            };
            let kind = match (base, module_type) {
                (true, _) => TemplateKind::Base,
                (false, Some(module_type)) => TemplateKind::Module { module_type },
                (false, None) => TemplateKind::Workspace,
            };
            let template = NewTemplate {
                name,
                description,
                body,
                kind,
                visibility,
                workspace: workspace_id,
            };
            let created = service.create(&template).await?;
            println!("{} Created template '{}' ({})", "✓".green(), created.name, created.id);
        }

        TemplateCommands::Delete { id, yes } => {
            let template = service.get(id).await?;
            if !confirm(&format!("Delete template '{}'?", template.name), yes)? {
                return Ok(());
            }
            service.delete(&template).await?;
            println!("{} Deleted template '{}'", "✓".green(), template.name);
        }
    }
    Ok(())
}

async fn upload_files(wizard: &mut Wizard, paths: &[PathBuf]) -> Result<()> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(
            CandidateFile::from_path(path)
                .await
                .with_context(|| format!("Could not read {}", path.display()))?,
        );
    }

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}% {msg}")?
            .progress_chars("█▉▊▋▌▍▎▏ "),
    );
    let report = wizard
        .upload(files, |progress| {
            pb.set_position(progress.percent as u64);
            pb.set_message(progress.filename.clone());
        })
        .await?;
    pb.finish_and_clear();

    println!(
        "{} Uploaded {} sample(s)",
        "✓".green(),
        report.uploaded.len()
    );
    if report.rejected > 0 {
        println!(
            "{} Skipped {} file(s) without the accepted extension",
            "!".yellow(),
            report.rejected
        );
    }
    for failure in &report.failures {
        println!("{} {}: {}", "✗".red(), failure.filename, failure.error);
    }
    if let Some(error) = &report.header_error {
        println!(
            "{} Could not refresh headers ({}); run `spam-genie headers` to retry",
            "!".yellow(),
            error
        );
    }
    Ok(())
}

fn print_headers(wizard: &Wizard) {
    let headers = wizard.headers().available();
    println!("\n📨 Headers in '{}' ({})", wizard.workspace().name, headers.len());
    println!("=====================================");
    if headers.is_empty() {
        println!("No headers yet. Upload some samples first.");
    }
    for (name, example) in headers.iter() {
        let example: String = example.chars().take(60).collect();
        println!("  {:<30} {}", name, example.dimmed());
    }
}

struct GenerateOptions {
    files: Vec<PathBuf>,
    headers: Vec<String>,
    all_headers: bool,
    base: Option<i64>,
    modules: Vec<i64>,
    prompt_file: Option<PathBuf>,
    feedback: Option<String>,
}

async fn run_generate(ctx: &App, wizard: &mut Wizard, options: GenerateOptions) -> Result<()> {
    if wizard.is_read_only() {
        warn!("Workspace '{}' is read-only", wizard.workspace().name);
        bail!(
            "'{}' was shared with you read-only; use `spam-genie results` to view its rules",
            wizard.workspace().name
        );
    }

    // Step 1: samples
    if !options.files.is_empty() {
        upload_files(wizard, &options.files).await?;
    }
    if !wizard.go_to(Step::Headers) && wizard.current_step() != Step::Headers {
        bail!("Upload at least one sample first");
    }

    // Step 2: headers
    if options.all_headers {
        wizard.select_all_headers()?;
    } else if options.headers.is_empty() {
        let selected = wizard.select_common_headers()?;
        info!("Selected {} common header(s)", selected);
    } else {
        for name in &options.headers {
            wizard.select_header(name.trim())?;
        }
    }
    if !wizard.go_to(Step::Prompt) {
        bail!("None of the requested headers were found in the samples");
    }
    println!(
        "{} Headers: {}",
        "✓".green(),
        wizard.headers().selected().join(", ")
    );

    // Step 3: prompt
    wizard.load_templates(&ctx.templates()).await?;
    if let Some(base) = options.base {
        wizard.select_base(base)?;
    }
    for module in options.modules {
        if !wizard.prompt().module_ids().contains(&module) {
            wizard.toggle_module(module)?;
        }
    }
    match options.prompt_file {
        Some(path) => {
            let text = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Could not read {}", path.display()))?;
            wizard.set_prompt_override(text)?;
            wizard.generate_prompt().await?;
            println!("{} Using prompt from {}", "✓".green(), path.display());
        }
        None => {
            let assembled = wizard.generate_prompt().await?;
            let base = assembled
                .metadata
                .base_prompt
                .as_ref()
                .map(|b| b.name.clone())
                .unwrap_or_else(|| "default".to_string());
            println!(
                "{} Prompt assembled from '{}' with {} module(s) over {} sample(s)",
                "✓".green(),
                base,
                assembled.metadata.modules.len(),
                assembled.metadata.email_sample_count
            );
        }
    }

    // Step 4: rule
    wizard.go_to(Step::Rule);
    let handle = wizard.submit(options.feedback).await?;
    let id = handle.result_id();

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    spinner.set_message(format!("Generating rule #{} ...", id));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let outcome = tokio::select! {
        outcome = handle.wait() => outcome,
        _ = tokio::signal::ctrl_c() => {
            wizard.cancel_poll();
            spinner.finish_and_clear();
            println!("{} Stopped waiting for rule #{}; check later with `spam-genie results`", "!".yellow(), id);
            return Ok(());
        }
    };
    spinner.finish_and_clear();

    let result = outcome?;
    println!("{} Rule #{} generated\n", "✓".green(), result.id);
    println!("{}", result.rule.unwrap_or_default());
    Ok(())
}
