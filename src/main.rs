use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;

use meetmind_lib::citations::extract_citations;
use meetmind_lib::events::{EventBus, NoticeLevel, UiEvent};
use meetmind_lib::models::{ChatMessage, KnowledgeBaseRequest};
use meetmind_lib::playback::MediaElement;
use meetmind_lib::timefmt::format_ms;
use meetmind_lib::{init_logging, ApiClient, ClientConfig, ClientError, ProjectView, RecordingView};

#[derive(Parser, Debug)]
#[command(name = "meetmind", version, about = "MeetMind meeting client")]
struct Cli {
    /// API root, e.g. http://localhost:8000
    #[arg(long, global = true, env = "MEETMIND_BASE_URL")]
    base_url: Option<String>,

    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Wait for a transcript and print it
    Transcript {
        recording_id: i64,
        /// Only print segments matching this text or speaker
        #[arg(long)]
        search: Option<String>,
    },
    /// Generate minutes, streaming them as they are written
    Minutes {
        recording_id: i64,
        #[arg(long, default_value = "")]
        context: String,
    },
    /// Ask the project assistant a question
    Ask {
        project_id: i64,
        question: String,
        /// Continue an existing chat session
        #[arg(long)]
        session: Option<String>,
    },
    /// Regenerate the project knowledge base
    Kb {
        project_id: i64,
        /// Minutes ids to include (defaults to every recording with minutes)
        #[arg(long, value_delimiter = ',')]
        minutes: Vec<i64>,
        /// Document ids to include (defaults to every project document)
        #[arg(long, value_delimiter = ',')]
        documents: Vec<i64>,
    },
    /// Restart transcription of a recording and wait for it
    Retry { recording_id: i64 },
}

/// Stand-in element for a terminal: it has no media output, so it never plays
#[derive(Debug, Default)]
struct Headless {
    time: f64,
    rate: f64,
}

impl MediaElement for Headless {
    fn current_time(&self) -> f64 {
        self.time
    }

    fn set_current_time(&mut self, secs: f64) {
        self.time = secs;
    }

    fn duration(&self) -> Option<f64> {
        None
    }

    fn has_metadata(&self) -> bool {
        false
    }

    fn is_paused(&self) -> bool {
        true
    }

    fn play(&mut self) -> std::result::Result<(), String> {
        Err("no media output in a terminal".to_string())
    }

    fn pause(&mut self) {}

    fn load(&mut self) {}

    fn playback_rate(&self) -> f64 {
        self.rate
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.rate = rate;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut config = ClientConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(base_url) = cli.base_url {
        config = config.with_base_url(base_url);
    }
    log::info!("Using API at {}", config.base_url);

    let api = ApiClient::new(config).context("Failed to build HTTP client")?;
    let events = EventBus::new();
    spawn_notice_printer(&events);

    match cli.command {
        Command::Transcript { recording_id, search } => print_transcript(api, events, recording_id, search).await,
        Command::Minutes { recording_id, context } => stream_minutes(api, events, recording_id, &context).await,
        Command::Ask { project_id, question, session } => ask(api, events, project_id, &question, session).await,
        Command::Kb { project_id, minutes, documents } => {
            generate_kb(api, events, project_id, minutes, documents).await
        }
        Command::Retry { recording_id } => retry(api, events, recording_id).await,
    }
}

/// Toasts go to stderr so stdout stays clean for content
fn spawn_notice_printer(events: &EventBus) {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            if let UiEvent::Notice { level, message } = event {
                let prefix = match level {
                    NoticeLevel::Info => "info",
                    NoticeLevel::Success => "ok",
                    NoticeLevel::Error => "error",
                };
                eprintln!("[{}] {}", prefix, message);
            }
        }
    });
}

async fn print_transcript(api: ApiClient, events: EventBus, recording_id: i64, search: Option<String>) -> Result<()> {
    let mut view: RecordingView<Headless> = RecordingView::new(api, recording_id, events);
    view.load().await?;
    view.wait_for_transcript().await.context("Transcript is not available")?;
    if let Some(query) = search {
        view.set_search(query);
    }

    let visible = view.visible_segments();
    for (_, segment) in visible.iter() {
        println!("[{}] {}: {}", format_ms(segment.start), segment.speaker, segment.text);
    }
    println!();
    println!("{} segment(s)", visible.count());

    for share in view.speaker_stats() {
        println!(
            "{:<20} {:>5.1}%  {}  ({} segments)",
            share.speaker,
            share.percentage,
            format_ms(share.duration_ms),
            share.segment_count
        );
    }
    view.close();
    Ok(())
}

async fn stream_minutes(api: ApiClient, events: EventBus, recording_id: i64, context: &str) -> Result<()> {
    let mut view: RecordingView<Headless> = RecordingView::new(api, recording_id, events);
    view.load().await?;

    let mut rx = view.minutes().subscribe_draft();
    let mut printed = 0;
    let result = {
        let generation = view.generate_minutes(context);
        tokio::pin!(generation);
        loop {
            tokio::select! {
                result = &mut generation => break result,
                Ok(()) = rx.changed() => {
                    let text = rx.borrow_and_update().clone();
                    print_tail(&text, &mut printed);
                }
            }
        }
    };
    print_tail(&view.minutes().draft(), &mut printed);
    println!();
    view.close();
    result.context("Minutes generation failed")
}

/// Print the part of a growing text not printed yet
fn print_tail(text: &str, printed: &mut usize) {
    if let Some(tail) = text.get(*printed..) {
        print!("{}", tail);
        let _ = std::io::stdout().flush();
    }
    *printed = text.len();
}

async fn ask(api: ApiClient, events: EventBus, project_id: i64, question: &str, session: Option<String>) -> Result<()> {
    let mut view = ProjectView::new(api, project_id, events);
    if let Some(session_id) = session {
        view.chat_mut().open_session(&session_id).await?;
    }

    let mut rx = view.chat().subscribe_messages();
    let mut progress = AnswerProgress::default();
    let result = {
        let answer = view.chat_mut().ask(question);
        tokio::pin!(answer);
        loop {
            tokio::select! {
                result = &mut answer => break result,
                Ok(()) = rx.changed() => {
                    let last = rx.borrow_and_update().last().cloned();
                    if let Some(message) = last {
                        progress.print(&message);
                    }
                }
            }
        }
    };
    if matches!(result, Err(ClientError::Rejected(_) | ClientError::Busy)) {
        return result.context("Question was not sent");
    }

    let messages = view.chat().messages();
    if let Some(answer) = messages.last() {
        progress.print(answer);
        println!();
        let citations = extract_citations(&answer.content);
        if !citations.is_empty() {
            println!();
            println!("Sources:");
            for citation in citations {
                match &citation.target {
                    Some(target) => println!("  {} -> {}", citation.label, target.href()),
                    None => println!("  {}", citation.label),
                }
            }
        }
    }
    if let Some(session_id) = view.chat().session_id() {
        eprintln!("session: {}", session_id);
    }
    view.close();
    result.context("Assistant failed")
}

/// How much of the streaming answer has been printed
#[derive(Debug, Default)]
struct AnswerProgress {
    thoughts: usize,
    actions: usize,
    printed: usize,
}

impl AnswerProgress {
    fn print(&mut self, answer: &ChatMessage) {
        for thought in answer.thoughts.iter().skip(self.thoughts) {
            eprintln!("thinking: {}", thought);
        }
        for action in answer.actions.iter().skip(self.actions) {
            eprintln!("using {}: {}", action.tool, action.query);
        }
        self.thoughts = answer.thoughts.len();
        self.actions = answer.actions.len();
        print_tail(&answer.content, &mut self.printed);
    }
}

async fn generate_kb(
    api: ApiClient,
    events: EventBus,
    project_id: i64,
    minutes: Vec<i64>,
    documents: Vec<i64>,
) -> Result<()> {
    let mut view = ProjectView::new(api, project_id, events);
    view.load().await?;

    let request = if minutes.is_empty() && documents.is_empty() {
        view.default_kb_request()
    } else {
        KnowledgeBaseRequest { minutes_ids: minutes, document_ids: documents }
    };

    let mut progress = view.knowledge_base().subscribe_progress();
    let printer = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            if let Some(status) = progress.borrow_and_update().status.clone() {
                eprintln!("{}", status);
            }
        }
    });
    let result = view.knowledge_base_mut().generate(&request).await;
    printer.abort();
    result.context("Knowledge base generation failed")?;

    if let Some(kb) = view.knowledge_base().content() {
        for section in meetmind_lib::models::KbSection::ALL {
            println!("# {}\n", section.title());
            println!("{}\n", kb.content.section(section));
        }
    }
    view.close();
    Ok(())
}

async fn retry(api: ApiClient, events: EventBus, recording_id: i64) -> Result<()> {
    let mut view: RecordingView<Headless> = RecordingView::new(api, recording_id, events);
    view.load().await?;
    view.retry_transcription().await.context("Failed to restart transcription")?;
    let store = view.wait_for_transcript().await.context("Transcription did not complete")?;
    println!("Transcription finished: {} segments", store.len());
    view.close();
    Ok(())
}
