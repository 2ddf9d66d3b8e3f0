use canvas_crosslist::core::courses;
use canvas_crosslist::core::normalize::build_course_artifacts;
use canvas_crosslist::core::validate::validate_candidates;
use canvas_crosslist::domain::model::CrosslistCandidate;
use canvas_crosslist::utils::{logger, validation::Validate};
use canvas_crosslist::{
    CanvasClient, Cli, CrosslistService, CsvAuditSink, FileCache, OperationContext,
    StaticTokenProvider,
};
use clap::Parser;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 初始化日誌
    logger::init_cli_logger(cli.verbose);

    let config = cli.canvas_config();
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e.user_message());
        std::process::exit(1);
    }

    let token = std::env::var("CANVAS_API_TOKEN").unwrap_or_default();
    if token.trim().is_empty() {
        eprintln!("❌ CANVAS_API_TOKEN is not set");
        std::process::exit(1);
    }

    let tokens: Arc<dyn canvas_crosslist::domain::ports::TokenProvider> =
        Arc::new(StaticTokenProvider::new(token));
    let cache = FileCache::new(&config.cache_path);
    let client = CanvasClient::new(config.clone(), Arc::clone(&tokens));
    let policy = cli.policy();

    match cli.command {
        canvas_crosslist::config::cli::Command::Terms => {
            let terms = courses::fetch_active_terms(&client, &cache).await?;
            if terms.is_empty() {
                println!("No active terms found");
            }
            for term in terms {
                println!("{:>8}  {}", term.id, term.name);
            }
        }

        canvas_crosslist::config::cli::Command::Courses {
            ref instructor,
            term_id,
        } => {
            let candidates = courses::resolve_instructor(&client, &cache, instructor).await?;
            let user = match candidates.as_slice() {
                [] => {
                    eprintln!("❌ No instructor matched '{}'", instructor);
                    std::process::exit(1);
                }
                [one] => one.clone(),
                many => {
                    eprintln!("Multiple instructors matched '{}':", instructor);
                    for c in many {
                        eprintln!(
                            "  {:>8}  {}  (sis: {})",
                            c.id,
                            c.name,
                            c.sis_user_id.as_deref().unwrap_or("-")
                        );
                    }
                    eprintln!("Re-run with a specific id");
                    std::process::exit(1);
                }
            };

            let raw = courses::get_user_courses(&client, user.id, term_id).await?;
            let artifacts = build_course_artifacts(&raw);
            if artifacts.is_empty() {
                println!("No courses found for {} in this term", user.name);
            }

            // 平行探測 manage_sections_add 權限,標示可當 parent 的課程
            let course_ids: Vec<i64> = artifacts.iter().map(|a| a.course_id).collect();
            let permissions =
                courses::check_course_permissions(&config, &tokens, &course_ids).await;

            for course in artifacts {
                let eligible = permissions
                    .get(&course.course_id)
                    .copied()
                    .unwrap_or(false);
                println!(
                    "{:>8}  {}  [{}]  {} students  {}  ({})",
                    course.course_id,
                    course.course_code,
                    course.workflow_state,
                    course.total_students,
                    if eligible { "manageable" } else { "read-only" },
                    course.name
                );
                for section in course.sections {
                    let mark = if section.cross_listed { "⇄" } else { " " };
                    println!("       {} {:>8}  {}", mark, section.id, section.name);
                }
            }
        }

        canvas_crosslist::config::cli::Command::Crosslist {
            child_section_id,
            parent_course_id,
            dry_run,
            override_sis,
            acknowledge_warnings,
            term_id,
            instructor_id,
        } => {
            // 先跑完整驗證,再交給 orchestrator
            let section = courses::get_section(&client, child_section_id).await?;
            let child_course_id = section.course_id.unwrap_or(parent_course_id);

            // 兩門課的詳細資料平行撈取
            let pair = courses::hydrate_courses(
                &config,
                &tokens,
                &[parent_course_id, child_course_id],
                &["term", "teachers", "total_students"],
            )
            .await;
            let parent = match pair.iter().find(|c| c.id == parent_course_id) {
                Some(course) => course.clone(),
                None => {
                    eprintln!("❌ Could not fetch parent course {}", parent_course_id);
                    std::process::exit(1);
                }
            };
            let child_course = match pair.iter().find(|c| c.id == child_course_id) {
                Some(course) => course.clone(),
                None => {
                    eprintln!("❌ Could not fetch child course {}", child_course_id);
                    std::process::exit(1);
                }
            };

            let outcome = validate_candidates(
                &policy,
                &CrosslistCandidate::from_course(&parent),
                &CrosslistCandidate::from_section(&section, &child_course),
            );

            for error in &outcome.errors {
                eprintln!("❌ {}", error);
            }
            for warning in &outcome.warnings {
                eprintln!("⚠️  {}", warning);
            }
            if outcome.is_blocked() {
                std::process::exit(1);
            }
            if outcome.needs_acknowledgment() && !acknowledge_warnings {
                eprintln!("Re-run with --acknowledge-warnings to proceed past warnings");
                std::process::exit(1);
            }

            let service = CrosslistService::new(
                client,
                policy.clone(),
                CsvAuditSink::new(&config.audit_log_path),
            );
            let ctx = OperationContext {
                as_user_id: None,
                term_id,
                instructor_id,
            };
            let ok = service
                .cross_list(child_section_id, parent_course_id, dry_run, override_sis, &ctx)
                .await;
            if ok {
                println!(
                    "✅ Section {} → course {}{}",
                    child_section_id,
                    parent_course_id,
                    if dry_run { " (dry run)" } else { "" }
                );
            } else {
                eprintln!("❌ Cross-list failed; see the audit log for details");
                std::process::exit(1);
            }
        }

        canvas_crosslist::config::cli::Command::Uncrosslist {
            section_id,
            dry_run,
            override_sis,
            term_id,
            instructor_id,
        } => {
            let service = CrosslistService::new(
                client,
                policy.clone(),
                CsvAuditSink::new(&config.audit_log_path),
            );
            let ctx = OperationContext {
                as_user_id: None,
                term_id,
                instructor_id,
            };
            let ok = service
                .un_cross_list(section_id, dry_run, override_sis, &ctx)
                .await;
            if ok {
                println!(
                    "✅ Section {} reverted{}",
                    section_id,
                    if dry_run { " (dry run)" } else { "" }
                );
            } else {
                eprintln!("❌ Un-cross-list failed; see the audit log for details");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
