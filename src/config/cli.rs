use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum, builder::BoolishValueParser};

use crate::domain::types::PostFilter;

/// Command-line arguments for the newsportal binary.
#[derive(Debug, Parser)]
#[command(
    name = "newsportal",
    version,
    about = "Newsportal rating and cache maintenance"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "NEWSPORTAL_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Apply pending database migrations.
    Migrate(MigrateArgs),
    /// Recompute and store author ratings.
    Recompute(RecomputeArgs),
    /// Show the rating components of one author without storing anything.
    #[command(name = "rating-breakdown")]
    RatingBreakdown(BreakdownArgs),
    /// Delete the posts filed under a category.
    #[command(name = "delete-posts")]
    DeletePosts(DeletePostsArgs),
}

impl Command {
    pub fn overrides(&self) -> &CommonOverrides {
        match self {
            Command::Migrate(args) => &args.overrides,
            Command::Recompute(args) => &args.overrides,
            Command::RatingBreakdown(args) => &args.overrides,
            Command::DeletePosts(args) => &args.overrides,
        }
    }
}

#[derive(Debug, Args, Default, Clone)]
pub struct CommonOverrides {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Clone)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,
}

#[derive(Debug, Args, Clone)]
#[command(group(ArgGroup::new("target").required(true).args(["author", "all"])))]
pub struct RecomputeArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,

    /// Recompute a single author.
    #[arg(long, value_name = "ID")]
    pub author: Option<i64>,

    /// Recompute every author.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub all: bool,
}

#[derive(Debug, Args, Clone)]
pub struct BreakdownArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,

    /// Author to inspect.
    #[arg(long, value_name = "ID")]
    pub author: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PostTypeArg {
    News,
    Articles,
    All,
}

impl From<PostTypeArg> for PostFilter {
    fn from(value: PostTypeArg) -> Self {
        match value {
            PostTypeArg::News => PostFilter::News,
            PostTypeArg::Articles => PostFilter::Articles,
            PostTypeArg::All => PostFilter::All,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct DeletePostsArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,

    /// Category id, or its exact name.
    #[arg(long, value_name = "ID|NAME")]
    pub category: String,

    /// Which posts to delete.
    #[arg(long = "post-type", value_enum, default_value_t = PostTypeArg::News)]
    pub post_type: PostTypeArg,
}
