//! Background distillation job: builds or refreshes a session's distilled
//! context from its transcript. Spawned detached by the context-reinforcement
//! hook (`--mode initial` the first time a session crosses the tool-call
//! threshold with no context file yet, `--mode refresh` every `refreshInterval`
//! injections thereafter). Grounded in `_distill-session-context.py` and
//! `_update-session-context.py`.

use warden_context::distillation;
use warden_context::ContextInjector;
use warden_runtime::{env, Paths};

#[tokio::main]
async fn main() {
    env::init_tracing();

    let mut session_id = String::new();
    let mut mode = "initial".to_string();
    let mut transcript_path: Option<String> = None;

    let mut args = std::env::args().skip(1);
    while let Some(flag) = args.next() {
        match flag.as_str() {
            "--session-id" => session_id = args.next().unwrap_or_default(),
            "--mode" => mode = args.next().unwrap_or_else(|| "initial".to_string()),
            "--transcript" => transcript_path = args.next(),
            _ => {}
        }
    }

    if session_id.is_empty() {
        return;
    }

    if let Err(e) = run(&session_id, &mode, transcript_path.as_deref()).await {
        tracing::warn!(error = %e, session_id, mode, "distillation job failed");
    }
}

async fn run(session_id: &str, mode: &str, transcript_path: Option<&str>) -> anyhow::Result<()> {
    let paths = Paths::resolve();
    let injector = ContextInjector::new(paths.avt_dir.clone());
    let backend = env::llm_backend();
    let mock = env::mock_review_enabled();

    let transcript = match transcript_path {
        Some(path) => tokio::fs::read_to_string(path).await.unwrap_or_default(),
        None => String::new(),
    };

    match mode {
        "refresh" => {
            let Some(mut ctx) = injector.load_session_context(session_id) else {
                return Ok(());
            };
            let recent = distillation::extract_recent_transcript(&transcript);
            let settings = warden_context::settings::load_settings(&paths.global_config_path(), &paths.project_config_path());
            let changed = distillation::refresh(backend.as_ref(), &mut ctx, &recent, "update-session-context", settings.max_discoveries_per_session, mock).await;
            if changed {
                injector.save_session_context(&ctx)?;
            }
        }
        _ => {
            let original_prompt = distillation::extract_original_prompt(&transcript);
            let (ctx, status) = distillation::distill_initial(backend.as_ref(), session_id, &original_prompt, mock).await?;
            tracing::debug!(session_id, status, "initial distillation complete");
            injector.save_session_context(&ctx)?;
        }
    }

    Ok(())
}
