use super::{App, CleanArgs, UserCommand};
use crate::audit::{AuditAction, Outcome};
use crate::auth::{has_permission, Permission, Role, UserInfo, UserStore};
use crate::core::ModuleContext;
use crate::engine::{parse_param_string, ModuleConfig, Orchestrator, PipelineConfig, Report};
use crate::io::{parse_file, write_file, ParseOptions};
use crate::modules::{missing_imputer, outlier_detector, text_normalizer};
use crate::registry::{ModuleKind, ModuleRegistry};
use anyhow::{anyhow, bail, Context, Result};
use serde_json::json;
use std::sync::Arc;

fn open_users(app: &App) -> Result<UserStore> {
    Ok(UserStore::open(app.store.user_db_path())?
        .with_cost(app.config.bcrypt_cost)
        .with_audit(Arc::clone(&app.audit)))
}

fn login(users: &UserStore, username: &str, password: Option<&str>) -> Result<UserInfo> {
    let password = password.ok_or_else(|| anyhow!("A password is required for user '{}'", username))?;
    users
        .login_user(username, password)?
        .ok_or_else(|| anyhow!("Login failed for user '{}'", username))
}

fn require(user: &UserInfo, permission: Permission) -> Result<()> {
    if !has_permission(&user.role, permission) {
        bail!(
            "User '{}' with role '{}' lacks the '{}' permission",
            user.username,
            user.role,
            permission
        );
    }
    Ok(())
}

fn module_step(registry: &ModuleRegistry, id: &str, params: serde_json::Value) -> Result<ModuleConfig> {
    let module = registry.get_module(id).ok_or_else(|| {
        anyhow!(
            "Unknown module '{}'. Run `sheetpilot modules` to list available modules",
            id
        )
    })?;
    Ok(ModuleConfig::new(id, module, params))
}

/// Steps from `--impute/--normalize/--outlier` then each `--module/--params` pair.
fn steps_from_flags(args: &CleanArgs, registry: &ModuleRegistry) -> Result<Vec<ModuleConfig>> {
    let mut steps = Vec::new();

    let presets = [
        (missing_imputer::MODULE_ID, &args.impute),
        (text_normalizer::MODULE_ID, &args.normalize),
        (outlier_detector::MODULE_ID, &args.outlier),
    ];
    for (id, settings) in presets {
        if let Some(settings) = settings {
            steps.push(module_step(registry, id, parse_param_string(settings))?);
        }
    }

    if args.params.len() > args.modules.len() {
        bail!("Each --params must follow a --module");
    }
    for (i, id) in args.modules.iter().enumerate() {
        let params = match args.params.get(i) {
            Some(raw) => serde_json::from_str(raw)
                .with_context(|| format!("Invalid JSON in --params for module '{}'", id))?,
            None => json!({}),
        };
        steps.push(module_step(registry, id, params)?);
    }

    Ok(steps)
}

fn print_report(report: &Report) {
    println!("\n=== Cleaning Report ===");
    println!("Steps completed: {}", report.steps_completed.join(", "));

    for (step, stats) in &report.stats {
        println!(
            "  {}: {:?}, {} -> {} rows in {} ms",
            step, stats.status, stats.rows_before, stats.rows_after, stats.duration_ms
        );
    }

    for (step, warning) in report.warnings() {
        println!("  warning [{}]: {}", step, warning);
    }

    if !report.errors.is_empty() {
        println!("\nErrors: {}", report.errors.len());
        for error in &report.errors {
            println!("  - {}: {}", error.module, error.error);
        }
    }
}

pub(super) async fn clean(app: &App, args: CleanArgs) -> Result<()> {
    let mut ctx = ModuleContext::new().with_audit(Arc::clone(&app.audit));
    if let Some(username) = &args.user {
        let users = open_users(app)?;
        let user = login(&users, username, args.password.as_deref())?;
        require(&user, Permission::RunPipelines)?;
        ctx = ctx.with_user(user);
    }

    println!("SheetPilot CLI");
    println!("{}", "=".repeat(50));
    println!("Loading data from {}...", args.input.display());

    let options = ParseOptions {
        format: args.format.clone(),
        ..ParseOptions::default()
    };
    let df = match parse_file(&args.input, &options) {
        Ok(df) => df,
        Err(e) => {
            app.audit.log_event(
                AuditAction::DataImported,
                Outcome::Failure,
                ctx.user_id(),
                Some(ctx.username()),
                json!({"file": args.input.display().to_string(), "error": e.to_string()}),
            );
            return Err(e.context("Error loading file"));
        }
    };
    println!("Loaded {} rows, {} columns", df.height(), df.width());
    app.audit.log_event(
        AuditAction::DataImported,
        Outcome::Success,
        ctx.user_id(),
        Some(ctx.username()),
        json!({
            "file": args.input.display().to_string(),
            "rows": df.height(),
            "columns": df.width(),
        }),
    );

    let registry = ModuleRegistry::new();
    let (mut steps, config_stop) = match &args.config {
        Some(path) => {
            let config = PipelineConfig::load(path).await?;
            (config.build_steps(&registry), config.stop_on_error)
        }
        None => (steps_from_flags(&args, &registry)?, None),
    };

    if steps.is_empty() {
        bail!("No cleaning operations specified");
    }

    let stop_on_error = args.stop_on_error || config_stop.unwrap_or(app.config.stop_on_error);
    println!("\nRunning cleaning pipeline...");
    let (cleaned, report) = Orchestrator::new(stop_on_error)
        .run_pipeline(&df, &mut steps, &ctx)
        .await;
    print_report(&report);

    println!("\nSaving cleaned data to {}...", args.output.display());
    write_file(&cleaned, &args.output)?;
    app.audit.log_event(
        AuditAction::DataExported,
        Outcome::Success,
        ctx.user_id(),
        Some(ctx.username()),
        json!({"file": args.output.display().to_string(), "rows": cleaned.height()}),
    );
    println!("Saved {} rows", cleaned.height());

    Ok(())
}

pub(super) fn modules() -> Result<()> {
    let registry = ModuleRegistry::new();

    for kind in [ModuleKind::Builtin, ModuleKind::Plugin] {
        let modules = registry.list_by_kind(kind);
        if modules.is_empty() {
            continue;
        }
        println!("{}:", if kind == ModuleKind::Builtin { "Modules" } else { "Plugins" });

        for meta in modules {
            println!("  {} ({}) - {}", meta.id, meta.category, meta.name);
            if !meta.description.is_empty() {
                println!("      {}", meta.description);
            }
            for param in &meta.parameters {
                let mut line = format!("      {} <{}>", param.name, param.param_type);
                if param.required {
                    line.push_str(" required");
                } else if !param.default.is_null() {
                    line.push_str(&format!(" [default: {}]", param.default));
                }
                if let Some(description) = &param.description {
                    line.push_str(&format!("  {}", description));
                }
                println!("{}", line);
            }
        }
    }
    Ok(())
}

pub(super) fn users(
    app: &App,
    admin_user: Option<String>,
    admin_password: Option<String>,
    action: UserCommand,
) -> Result<()> {
    let users = open_users(app)?;

    if users.has_role(Role::Admin.as_str())? {
        let username = admin_user
            .as_deref()
            .ok_or_else(|| anyhow!("Administrator credentials required (--admin-user/--admin-password)"))?;
        let admin = login(&users, username, admin_password.as_deref())?;
        require(&admin, Permission::ManageUsers)?;
    } else {
        log::info!("No administrator account exists yet; running without credentials");
    }

    match action {
        UserCommand::Add {
            username,
            password,
            role,
        } => {
            role.parse::<Role>()?;
            if !users.add_user(&username, &password, &role)? {
                bail!("User '{}' already exists", username);
            }
            println!("User '{}' created with role '{}'", username, role);
        }
        UserCommand::List => {
            println!("{:<6} {:<20} {:<8} CREATED", "ID", "USERNAME", "ROLE");
            for user in users.list_users()? {
                println!(
                    "{:<6} {:<20} {:<8} {}",
                    user.id, user.username, user.role, user.created_at
                );
            }
        }
        UserCommand::Delete { username } => {
            if !users.delete_user(&username)? {
                bail!("User '{}' not found", username);
            }
            println!("User '{}' deleted", username);
        }
        UserCommand::SetRole { username, role } => {
            role.parse::<Role>()?;
            if !users.update_user_role(&username, &role)? {
                bail!("User '{}' not found", username);
            }
            println!("Role for '{}' set to '{}'", username, role);
        }
        UserCommand::SetPassword { username, password } => {
            if !users.update_user_password(&username, &password)? {
                bail!("User '{}' not found", username);
            }
            println!("Password for '{}' updated", username);
        }
    }
    Ok(())
}

pub(super) fn audit(app: &App, limit: usize) -> Result<()> {
    for entry in app.audit.recent(limit)? {
        let details = entry
            .details
            .map(|d| d.to_string())
            .unwrap_or_default();
        println!(
            "{:>5} {} {:<32} {:<14} {:<12} {}",
            entry.id,
            entry.timestamp,
            entry.action_type,
            entry.outcome,
            entry.username.unwrap_or_default(),
            details
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLog;
    use crate::config::{AppConfig, ConfigStore};
    use crate::core::Value;
    use std::path::Path;

    const INPUT: &str = "id,name,score\n1,Alice,10\n2,BOB,\n3,Carol,12\n4,Dan,13\n5,Eve,1000\n";

    fn app(home: &Path) -> App {
        let store = ConfigStore::new(home);
        let audit = Arc::new(AuditLog::open(store.audit_db_path()).unwrap());
        App {
            store,
            config: AppConfig {
                bcrypt_cost: 4,
                ..AppConfig::default()
            },
            audit,
        }
    }

    fn args(dir: &Path) -> CleanArgs {
        let input = dir.join("input.csv");
        std::fs::write(&input, INPUT).unwrap();
        CleanArgs {
            input,
            output: dir.join("out").join("cleaned.csv"),
            format: None,
            impute: None,
            normalize: None,
            outlier: None,
            config: None,
            modules: Vec::new(),
            params: Vec::new(),
            stop_on_error: false,
            user: None,
            password: None,
        }
    }

    #[tokio::test]
    async fn test_clean_without_steps_fails() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let err = clean(&app, args(dir.path())).await.unwrap_err();
        assert_eq!(err.to_string(), "No cleaning operations specified");
    }

    #[tokio::test]
    async fn test_clean_records_import_and_export() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let args = CleanArgs {
            impute: Some("columns=score method=median".to_string()),
            ..args(dir.path())
        };
        let output = args.output.clone();

        clean(&app, args).await.unwrap();

        let cleaned = parse_file(&output, &ParseOptions::default()).unwrap();
        assert_eq!(cleaned.column("score").unwrap().null_count(), 0);

        let actions: Vec<String> = app
            .audit
            .recent(10)
            .unwrap()
            .into_iter()
            .map(|e| e.action_type)
            .collect();
        assert_eq!(
            actions,
            vec![
                "DATA_EXPORTED",
                "PIPELINE_EXECUTION_END",
                "PIPELINE_EXECUTION_START",
                "DATA_IMPORTED",
            ]
        );
        let imported = &app.audit.recent(10).unwrap()[3];
        assert_eq!(imported.outcome, "SUCCESS");
        assert_eq!(imported.details.as_ref().unwrap()["rows"], 5);
    }

    #[tokio::test]
    async fn test_missing_input_is_audited_as_failure() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let args = CleanArgs {
            input: dir.path().join("absent.csv"),
            impute: Some("method=mean".to_string()),
            ..args(dir.path())
        };

        let err = clean(&app, args).await.unwrap_err();
        assert!(format!("{:#}", err).contains("File not found"));

        let entry = &app.audit.recent(1).unwrap()[0];
        assert_eq!(entry.action_type, "DATA_IMPORTED");
        assert_eq!(entry.outcome, "FAILURE");
    }

    #[tokio::test]
    async fn test_role_without_run_permission_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        open_users(&app)
            .unwrap()
            .add_user("vera", "pw", "viewer")
            .unwrap();

        let args = CleanArgs {
            impute: Some("method=mean".to_string()),
            user: Some("vera".to_string()),
            password: Some("pw".to_string()),
            ..args(dir.path())
        };
        let output = args.output.clone();

        let err = clean(&app, args).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "User 'vera' with role 'viewer' lacks the 'run_pipelines' permission"
        );
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_wrong_password_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        open_users(&app)
            .unwrap()
            .add_user("ed", "pw", "editor")
            .unwrap();

        let args = CleanArgs {
            impute: Some("method=mean".to_string()),
            user: Some("ed".to_string()),
            password: Some("nope".to_string()),
            ..args(dir.path())
        };
        let err = clean(&app, args).await.unwrap_err();
        assert_eq!(err.to_string(), "Login failed for user 'ed'");
    }

    #[tokio::test]
    async fn test_params_without_module_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let args = CleanArgs {
            params: vec!["{}".to_string()],
            ..args(dir.path())
        };

        let err = clean(&app, args).await.unwrap_err();
        assert_eq!(err.to_string(), "Each --params must follow a --module");
    }

    #[tokio::test]
    async fn test_module_flags_run_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let args = CleanArgs {
            modules: vec!["missing_imputer".to_string(), "text_normalizer".to_string()],
            params: vec![
                r#"{"columns": ["score"], "method": "constant", "fill_value": -1}"#.to_string(),
                r#"{"columns": ["name"]}"#.to_string(),
            ],
            ..args(dir.path())
        };
        let output = args.output.clone();

        clean(&app, args).await.unwrap();

        let cleaned = parse_file(&output, &ParseOptions::default()).unwrap();
        assert_eq!(cleaned.column("score").unwrap().values[1], Value::Int(-1));
        assert_eq!(cleaned.column("name").unwrap().values[1], Value::from("bob"));
    }

    #[tokio::test]
    async fn test_unknown_module_flag_fails() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let args = CleanArgs {
            modules: vec!["nope".to_string()],
            ..args(dir.path())
        };

        let err = clean(&app, args).await.unwrap_err();
        assert!(err.to_string().starts_with("Unknown module 'nope'"));
    }

    #[tokio::test]
    async fn test_config_file_replaces_flags() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let config = dir.path().join("pipeline.json");
        std::fs::write(
            &config,
            json!({"steps": [{"module": "text_normalizer", "params": {"columns": ["name"]}}]})
                .to_string(),
        )
        .unwrap();

        let args = CleanArgs {
            config: Some(config),
            outlier: Some("columns=score method=iqr".to_string()),
            ..args(dir.path())
        };
        let output = args.output.clone();

        clean(&app, args).await.unwrap();

        let cleaned = parse_file(&output, &ParseOptions::default()).unwrap();
        assert_eq!(cleaned.height(), 5);
        assert_eq!(cleaned.column("name").unwrap().values[1], Value::from("bob"));
        assert_eq!(cleaned.column("score").unwrap().values[4], Value::Int(1000));
    }
}
