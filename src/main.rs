use std::{process, sync::Arc};

use newsportal::{
    application::{
        content::CategoryRef, context::ApplicationContext, error::AppError,
        rating::RatingService,
    },
    config::{self, BreakdownArgs, DeletePostsArgs, RecomputeArgs},
    domain::types::PostFilter,
    infra::{db::PostgresRepositories, error::InfraError, telemetry},
};
use serde::Serialize;
use serde_json::json;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match cli_args.command {
        config::Command::Migrate(_) => run_migrate(&settings).await,
        config::Command::Recompute(args) => run_recompute(&settings, args).await,
        config::Command::RatingBreakdown(args) => run_breakdown(&settings, args).await,
        config::Command::DeletePosts(args) => run_delete_posts(&settings, args).await,
    }
}

async fn run_migrate(settings: &config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(settings).await?;
    PostgresRepositories::run_migrations(repositories.pool())
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!("Database migrations applied");
    Ok(())
}

async fn run_recompute(settings: &config::Settings, args: RecomputeArgs) -> Result<(), AppError> {
    let repositories = init_repositories(settings).await?;
    let rating = rating_service(repositories, settings);

    match args.author {
        Some(author_id) => {
            let value = rating.recompute_author_rating(author_id).await?;
            print_json(&json!({ "author_id": author_id, "rating": value }))
        }
        None => {
            let summary = rating.recompute_all().await?;
            print_json(&summary)?;
            if summary.failed.is_empty() {
                Ok(())
            } else {
                Err(AppError::unexpected(format!(
                    "rating recompute failed for {} author(s)",
                    summary.failed.len()
                )))
            }
        }
    }
}

async fn run_breakdown(settings: &config::Settings, args: BreakdownArgs) -> Result<(), AppError> {
    let repositories = init_repositories(settings).await?;
    let breakdown = rating_service(repositories, settings)
        .breakdown(args.author)
        .await?;

    print_json(&json!({
        "author_id": args.author,
        "own_posts": breakdown.own_posts,
        "own_comments": breakdown.own_comments,
        "received_comments": breakdown.received_comments,
        "rating": breakdown.total(),
    }))
}

async fn run_delete_posts(
    settings: &config::Settings,
    args: DeletePostsArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(settings).await?;
    let content = ApplicationContext::new(repositories, settings).content;

    let category = content
        .find_category(&CategoryRef::from(args.category.as_str()))
        .await?;
    let filter = PostFilter::from(args.post_type);
    let removed = content
        .delete_posts_in_category(category.id, filter)
        .await?;

    print_json(&json!({
        "category_id": category.id,
        "category": category.name,
        "post_type": filter,
        "deleted": removed.len(),
        "post_ids": removed.iter().map(|post| post.id).collect::<Vec<_>>(),
    }))
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn rating_service(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> RatingService {
    ApplicationContext::new(repositories, settings).rating
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to encode output: {err}")))?;
    println!("{rendered}");
    Ok(())
}
