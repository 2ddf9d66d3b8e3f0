use crate::config::{CanvasConfig, CrosslistPolicy};
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "canvas-crosslist")]
#[command(about = "Cross-list course sections into a parent course shell")]
pub struct Cli {
    #[arg(long, default_value = "")]
    pub base_url: String,

    #[arg(long, default_value = "1")]
    pub account_id: i64,

    #[arg(long, default_value = "./cache/crosslist_cache.json")]
    pub cache_path: String,

    #[arg(long, default_value = "./logs/crosslist_audit.csv")]
    pub audit_log_path: String,

    #[arg(long, default_value = "4")]
    pub concurrent_requests: usize,

    #[arg(long, help = "Allow a published parent course")]
    pub allow_published_parent: bool,

    #[arg(long, help = "Allow parent and child in different enrollment terms")]
    pub allow_term_mismatch: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List active enrollment terms (cached)
    Terms,
    /// List an instructor's normalized courses and sections for a term
    Courses {
        /// SIS id, Canvas user id, or name fragment
        instructor: String,
        #[arg(long)]
        term_id: Option<i64>,
    },
    /// Merge a child section into a parent course shell
    Crosslist {
        child_section_id: i64,
        parent_course_id: i64,
        #[arg(long)]
        dry_run: bool,
        #[arg(long, help = "Bypass SIS field stickiness protections")]
        override_sis: bool,
        #[arg(long, help = "Proceed past non-blocking warnings")]
        acknowledge_warnings: bool,
        #[arg(long)]
        term_id: Option<i64>,
        #[arg(long)]
        instructor_id: Option<i64>,
    },
    /// Reverse a merge, returning the section to its origin course
    Uncrosslist {
        section_id: i64,
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        override_sis: bool,
        #[arg(long)]
        term_id: Option<i64>,
        #[arg(long)]
        instructor_id: Option<i64>,
    },
}

impl Cli {
    pub fn canvas_config(&self) -> CanvasConfig {
        CanvasConfig {
            base_url: self.base_url.clone(),
            account_id: self.account_id,
            cache_path: self.cache_path.clone(),
            audit_log_path: self.audit_log_path.clone(),
            concurrent_requests: self.concurrent_requests,
            ..Default::default()
        }
    }

    pub fn policy(&self) -> CrosslistPolicy {
        CrosslistPolicy {
            require_parent_unpublished: !self.allow_published_parent,
            require_same_term: !self.allow_term_mismatch,
            ..Default::default()
        }
    }
}
