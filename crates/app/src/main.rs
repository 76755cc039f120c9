use std::fmt;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use coach_core::model::{Answer, ProgressFlag, Question, RoleplayStep};
use coach_core::{Clock, Lang, grade};
use services::{
    CertificateService, ContentStore, ExamKind, ExamService, FeedbackClient, ModuleSummary,
    ProgressService,
};
use speech::{SpeakOptions, SpeechSynthesizer, default_synthesizer};
use storage::repository::{ProgressStore, Storage};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidExam { raw: String },
    InvalidLang { raw: String },
    InvalidModule { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidExam { raw } => write!(f, "invalid --exam value: {raw}"),
            ArgsError::InvalidLang { raw } => write!(f, "invalid --lang value: {raw}"),
            ArgsError::InvalidModule { raw } => write!(f, "invalid --module value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- practice [--module phrases|pronunciation|signals|roleplays]");
    eprintln!("                               [--db <sqlite_url>] [--content-dir <dir>] [--lang en|es]");
    eprintln!("  cargo run -p app -- exam --exam phrases|signals|final [--name <full name>]");
    eprintln!("  cargo run -p app -- progress  [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- feedback  [--name <full name>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:coach.sqlite3");
    eprintln!("  --content-dir content");
    eprintln!("  --module phrases");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  COACH_DB_URL, COACH_CONTENT_DIR, COACH_FEEDBACK_URL, COACH_AGENT_ID");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Practice,
    Exam,
    Progress,
    Feedback,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "practice" => Some(Self::Practice),
            "exam" => Some(Self::Exam),
            "progress" => Some(Self::Progress),
            "feedback" => Some(Self::Feedback),
            _ => None,
        }
    }
}

/// Learning module driven by the `practice` subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Module {
    Phrases,
    Pronunciation,
    Signals,
    Roleplays,
}

struct Args {
    db_url: String,
    content_dir: String,
    full_name: String,
    lang: Lang,
    exam: ExamKind,
    module: Module,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("COACH_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://coach.sqlite3".into(), normalize_sqlite_url);
        let mut content_dir =
            std::env::var("COACH_CONTENT_DIR").unwrap_or_else(|_| "content".into());
        let mut full_name = String::new();
        let mut lang = Lang::En;
        let mut exam = ExamKind::Final;
        let mut module = Module::Phrases;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--content-dir" => {
                    content_dir = require_value(args, "--content-dir")?;
                }
                "--name" => {
                    full_name = require_value(args, "--name")?;
                }
                "--lang" => {
                    let value = require_value(args, "--lang")?;
                    lang = match value.as_str() {
                        "en" => Lang::En,
                        "es" => Lang::Es,
                        _ => return Err(ArgsError::InvalidLang { raw: value }),
                    };
                }
                "--exam" => {
                    let value = require_value(args, "--exam")?;
                    exam = match value.as_str() {
                        "phrases" => ExamKind::Phrases,
                        "signals" => ExamKind::Signals,
                        "final" => ExamKind::Final,
                        _ => return Err(ArgsError::InvalidExam { raw: value }),
                    };
                }
                "--module" => {
                    let value = require_value(args, "--module")?;
                    module = match value.as_str() {
                        "phrases" => Module::Phrases,
                        "pronunciation" => Module::Pronunciation,
                        "signals" => Module::Signals,
                        "roleplays" => Module::Roleplays,
                        _ => return Err(ArgsError::InvalidModule { raw: value }),
                    };
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            content_dir,
            full_name,
            lang,
            exam,
            module,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

//
// ─── TERMINAL HELPERS ──────────────────────────────────────────────────────────
//

fn prompt_line(prompt: &str) -> io::Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_owned())
}

fn read_answer(question: &Question) -> io::Result<Option<Answer>> {
    match question {
        Question::TranslationMc { question, options, .. } => {
            println!("\n{question}");
            for (i, opt) in options.iter().enumerate() {
                println!("  {}. {opt}", i + 1);
            }
            let raw = prompt_line("Respuesta (número): ")?;
            Ok(raw
                .parse::<usize>()
                .ok()
                .filter(|n| (1..=options.len()).contains(n))
                .map(|n| Answer::Choice(n - 1)))
        }
        Question::AudioMc { prompt, options, .. } => {
            println!("\n{prompt}");
            for (i, opt) in options.iter().enumerate() {
                println!("  {}. {opt}", i + 1);
            }
            let raw = prompt_line("Respuesta (número): ")?;
            Ok(raw
                .parse::<usize>()
                .ok()
                .filter(|n| (1..=options.len()).contains(n))
                .map(|n| Answer::Choice(n - 1)))
        }
        Question::Fill { question, .. } => {
            println!("\n{question}");
            let raw = prompt_line("Respuesta: ")?;
            Ok((!raw.is_empty()).then_some(Answer::Text(raw)))
        }
        Question::Order { question, chunks, .. } => {
            println!("\n{question}");
            println!("Fragmentos: {}", chunks.join(" | "));
            let raw = prompt_line("Ordena los fragmentos separados por '|': ")?;
            let seq: Vec<String> = raw
                .split('|')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect();
            Ok((!seq.is_empty()).then_some(Answer::Order(seq)))
        }
    }
}

//
// ─── COMMANDS ──────────────────────────────────────────────────────────────────
//

async fn run_practice(
    args: &Args,
    content: &ContentStore,
    progress: &ProgressService,
    feedback: &FeedbackClient,
) -> Result<(), Box<dyn std::error::Error>> {
    match args.module {
        Module::Phrases => run_phrases(args, content, progress, feedback).await,
        Module::Pronunciation => run_pronunciation(args, content, progress).await,
        Module::Signals => run_signals(content, progress).await,
        Module::Roleplays => run_roleplays(args, content, progress).await,
    }
}

async fn run_phrases(
    args: &Args,
    content: &ContentStore,
    progress: &ProgressService,
    feedback: &FeedbackClient,
) -> Result<(), Box<dyn std::error::Error>> {
    let cards = content.phrases()?;
    let synth = default_synthesizer();
    let mut mistakes: Vec<String> = Vec::new();
    let mut scores: Vec<f64> = Vec::new();

    println!("Práctica de frases con el inspector ({} frases)\n", cards.len());

    for card in &cards {
        println!("Inspector: {}", card.inspector_en);
        println!("           {}", card.inspector_es);
        synth.speak(&card.inspector_en, SpeakOptions::for_lang(Lang::En));

        let expected = match args.lang {
            Lang::En => &card.driver_en,
            Lang::Es => &card.driver_es,
        };
        println!("Tu línea:  {expected}");
        synth.speak(expected, SpeakOptions::slow(args.lang));

        let attempt = prompt_line("Repite (o escribe) la frase: ")?;
        let result = grade(&attempt, expected);
        println!(
            "  {} (puntaje {:.0}%)\n",
            result.label,
            result.score * 100.0
        );
        scores.push(result.score);
        if result.ok {
            progress.mark_phrase_done(&card.id).await?;
        } else {
            mistakes.push(expected.clone());
        }
    }

    let map = progress.item_map(storage::keys::M2_PROGRESS).await;
    let pct = ProgressService::completion_pct(&map, cards.len());
    println!("Progreso del módulo: {pct}%");

    if pct == 100 {
        progress
            .set_flag(ProgressFlag::M1PhrasesCompleted, true)
            .await?;
        println!("Módulo de frases completado.\n");

        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let avg = (scores.iter().sum::<f64>() / scores.len().max(1) as f64 * 100.0) as u32;
        let summary = ModuleSummary {
            module_name: "Frases con el inspector".into(),
            student_name: (!args.full_name.is_empty()).then(|| args.full_name.clone()),
            score: avg,
            strengths: vec!["Completó todas las frases del módulo".into()],
            mistakes,
        };
        match feedback.module_feedback(&summary).await {
            Ok(text) => println!("Retroalimentación:\n{text}"),
            Err(err) => eprintln!("No se pudo obtener retroalimentación: {err}"),
        }
    }

    Ok(())
}

async fn run_pronunciation(
    args: &Args,
    content: &ContentStore,
    progress: &ProgressService,
) -> Result<(), Box<dyn std::error::Error>> {
    let cards = content.phrases()?;
    let synth = default_synthesizer();
    let mut passed = 0usize;
    let mut attempted = 0usize;

    println!("Pronunciación guiada ({} frases)\n", cards.len());

    for card in &cards {
        let line = match args.lang {
            Lang::En => &card.driver_en,
            Lang::Es => &card.driver_es,
        };
        if line.is_empty() {
            continue;
        }
        println!("Frase: {line}");
        if args.lang == Lang::Es {
            if let Some(guide) = &card.driver_es_phonetics {
                println!("Guía:  {guide}");
            }
        }
        synth.speak(line, SpeakOptions::slow(args.lang));

        let attempt = prompt_line("Repite la frase: ")?;
        let result = grade(&attempt, line);
        println!("  {} (puntaje {:.0}%)\n", result.label, result.score * 100.0);
        attempted += 1;
        if result.ok {
            passed += 1;
        }
    }

    println!("Frases logradas: {passed}/{attempted}");
    progress
        .set_flag(ProgressFlag::M2PronunciationCompleted, true)
        .await?;
    println!("Módulo de pronunciación completado.");
    Ok(())
}

async fn run_signals(
    content: &ContentStore,
    progress: &ProgressService,
) -> Result<(), Box<dyn std::error::Error>> {
    let signals = content.signals()?;
    let synth = default_synthesizer();

    println!("Señales del inspector ({} señales)\n", signals.len());

    for signal in &signals {
        println!("Señal:  {} / {}", signal.name_en, signal.name_es);
        println!("Acción: {}", signal.action_en);
        println!("        {}", signal.action_es);
        synth.speak(&signal.name_en, SpeakOptions::for_lang(Lang::En));
        prompt_line("Enter para continuar... ")?;
        progress.mark_signal_seen(&signal.id).await?;
        println!();
    }

    let map = progress.item_map(storage::keys::M3_SEEN).await;
    let pct = ProgressService::completion_pct(&map, signals.len());
    println!("Progreso del módulo: {pct}%");

    if pct == 100 {
        progress
            .set_flag(ProgressFlag::M3SignalsCompleted, true)
            .await?;
        println!("Módulo de señales completado.");
    }
    Ok(())
}

async fn run_roleplays(
    args: &Args,
    content: &ContentStore,
    progress: &ProgressService,
) -> Result<(), Box<dyn std::error::Error>> {
    let roleplays = content.roleplays()?;
    let synth = default_synthesizer();
    let mut all_lines_passed = true;

    for roleplay in &roleplays {
        println!("\n=== {} ===", roleplay.title);

        for (index, step) in roleplay.steps.iter().enumerate() {
            match step {
                RoleplayStep::Inspector { en, es } => {
                    println!("Inspector: {en}");
                    println!("           {es}");
                    synth.speak(en, SpeakOptions::for_lang(Lang::En));
                }
                RoleplayStep::Driver {
                    expected_en,
                    expected_es,
                    phonetics_es,
                } => {
                    let expected = match args.lang {
                        Lang::En => expected_en,
                        Lang::Es => expected_es,
                    };
                    println!("Tu línea:  {expected}");
                    if args.lang == Lang::Es {
                        if let Some(guide) = phonetics_es {
                            println!("Guía:      {guide}");
                        }
                    }
                    let attempt = prompt_line("Repite (o escribe) la frase: ")?;
                    let result = grade(&attempt, expected);
                    println!("  {} (puntaje {:.0}%)", result.label, result.score * 100.0);
                    if !result.ok {
                        all_lines_passed = false;
                    }
                }
            }
            let reached = u32::try_from(index + 1).unwrap_or(u32::MAX);
            progress.record_roleplay_step(&roleplay.id, reached).await?;
        }
    }

    if all_lines_passed {
        progress
            .set_flag(ProgressFlag::M4RoleplaysCompleted, true)
            .await?;
        println!("\nMódulo de roleplays completado.");
    } else {
        println!("\nRepite las líneas que no alcanzaron el puntaje para completar el módulo.");
    }
    Ok(())
}

async fn run_exam(
    args: &Args,
    content: &ContentStore,
    exams: &ExamService,
    certificates: &CertificateService,
) -> Result<(), Box<dyn std::error::Error>> {
    let questions = match args.exam {
        ExamKind::Phrases => content.exam_m2()?,
        ExamKind::Signals => content.exam_signals()?,
        ExamKind::Final => content.exam_final()?,
    };

    // Surface a previous pass before making the student retake anything.
    if let Some(stored) = exams.reconcile(args.exam).await? {
        if stored.passed() {
            println!(
                "Ya aprobaste este examen con {:.0}% el {}.",
                stored.score,
                stored.completed_at.format("%Y-%m-%d")
            );
        }
    }

    println!("{} — {} preguntas", args.exam.display_name(), questions.len());

    let synth = default_synthesizer();
    let mut answers: Vec<Option<Answer>> = vec![None; questions.len()];
    for (i, question) in questions.iter().enumerate() {
        if let Question::AudioMc { audio_text, .. } = question {
            synth.speak(audio_text, SpeakOptions::for_lang(Lang::En));
        }
        loop {
            match read_answer(question)? {
                Some(answer) => {
                    answers[i] = Some(answer);
                    break;
                }
                None => println!("Pregunta sin responder. Responde antes de continuar."),
            }
        }
    }

    let result = exams
        .submit(args.exam, &args.full_name, &questions, &answers)
        .await?;
    println!(
        "\nResultado: {}/{} correctas — {:.0}%",
        result.correct_answers, result.total_questions, result.score
    );

    if result.passed() {
        println!("Aprobado.");
        if args.exam == ExamKind::Final {
            let cert = certificates.issue(&args.full_name).await?;
            println!(
                "Certificado {} emitido para {} ({:.0}%).",
                cert.certificate_id, cert.full_name, cert.score
            );
        }
    } else {
        println!("No alcanzaste el 80%. Puedes intentarlo de nuevo.");
    }

    Ok(())
}

async fn run_progress(progress: &ProgressService) {
    let flags = progress.load().await;
    println!("Módulos:");
    println!("  frases:        {}", done(flags.m1_phrases_completed));
    println!("  pronunciación: {}", done(flags.m2_pronunciation_completed));
    println!("  señales:       {}", done(flags.m3_signals_completed));
    println!("  roleplays:     {}", done(flags.m4_roleplays_completed));
    println!("Exámenes:");
    println!("  frases:        {}", done(flags.exam_phrases_passed));
    println!("  señales:       {}", done(flags.exam_signals_passed));
    println!("  certificable:  {}", done(flags.exam_cert_passed));
    println!();
    println!(
        "Módulos completos: {}",
        yesno(flags.learning_modules_completed())
    );
    println!(
        "Puede tomar examen certificable: {}",
        yesno(flags.can_take_cert_exam())
    );
    println!("Curso completo: {}", yesno(flags.course_fully_completed()));
}

fn done(flag: bool) -> &'static str {
    if flag { "completado" } else { "pendiente" }
}

fn yesno(flag: bool) -> &'static str {
    if flag { "sí" } else { "no" }
}

async fn run_feedback(
    args: &Args,
    exams: &ExamService,
    feedback: &FeedbackClient,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(result) = exams.latest_result(args.exam).await? else {
        println!("Aún no hay resultados para {}.", args.exam.display_name());
        return Ok(());
    };

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let summary = ModuleSummary {
        module_name: args.exam.display_name().into(),
        student_name: (!args.full_name.is_empty()).then(|| args.full_name.clone()),
        score: result.score.round() as u32,
        strengths: vec![format!(
            "{} de {} respuestas correctas",
            result.correct_answers, result.total_questions
        )],
        mistakes: if result.passed() {
            vec![]
        } else {
            vec!["No alcanzó el puntaje mínimo del examen".into()]
        },
    };

    let text = feedback.module_feedback(&summary).await?;
    println!("{text}");
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Progress,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Progress,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            io::Error::new(io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let args = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so
    // core/services stay pure.
    prepare_sqlite_file(&args.db_url)?;
    let storage = Storage::sqlite(&args.db_url).await?;
    let store = ProgressStore::new(Arc::clone(&storage.kv));

    let progress = ProgressService::new(store.clone());
    let exams = ExamService::new(store.clone(), progress.clone(), Clock::default_clock());
    let certificates = CertificateService::new(store);
    let content = ContentStore::new(&args.content_dir);
    let feedback = FeedbackClient::from_env();

    match cmd {
        Command::Practice => run_practice(&args, &content, &progress, &feedback).await,
        Command::Exam => run_exam(&args, &content, &exams, &certificates).await,
        Command::Progress => {
            run_progress(&progress).await;
            Ok(())
        }
        Command::Feedback => run_feedback(&args, &exams, &feedback).await,
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &[&str]) -> Result<Args, ArgsError> {
        let mut iter = raw.iter().map(|s| (*s).to_owned());
        Args::parse(&mut iter)
    }

    #[test]
    fn practice_module_flag_selects_each_learning_module() {
        for (raw, expected) in [
            ("phrases", Module::Phrases),
            ("pronunciation", Module::Pronunciation),
            ("signals", Module::Signals),
            ("roleplays", Module::Roleplays),
        ] {
            let args = parse(&["--module", raw]).unwrap();
            assert_eq!(args.module, expected);
        }
    }

    #[test]
    fn module_defaults_to_phrases() {
        let args = parse(&[]).unwrap();
        assert_eq!(args.module, Module::Phrases);
    }

    #[test]
    fn unknown_module_is_rejected() {
        assert!(matches!(
            parse(&["--module", "driving"]),
            Err(ArgsError::InvalidModule { .. })
        ));
    }
}
