use std::fmt;
use std::path::PathBuf;

use services::{AppServices, Clock, ProgressManager};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use tutor_core::model::{
    BadgeId, Curriculum, FontSize, LessonId, Preferences, ProgressPatch, Theme, UserId,
};
use tutor_core::unlock::LessonStatus;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArgument { name: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidValue { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { name } => write!(f, "missing argument: <{name}>"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidValue { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid database url: {raw}"),
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

fn require_positional(
    args: &mut impl Iterator<Item = String>,
    name: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingArgument { name })
}

fn parse_value<T: std::str::FromStr>(raw: String, flag: &'static str) -> Result<T, ArgsError> {
    raw.parse().map_err(|_| ArgsError::InvalidValue { flag, raw })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [options] status");
    eprintln!("  cargo run -p app -- [options] complete <lesson-id> <score> [--perfect]");
    eprintln!("  cargo run -p app -- [options] badge <badge-id>");
    eprintln!("  cargo run -p app -- [options] badge --eligible");
    eprintln!(
        "  cargo run -p app -- [options] prefs [--language <tag>] [--theme <light|dark|high-contrast>]"
    );
    eprintln!(
        "                                      [--font-size <small|medium|large>] [--sound <on|off>] [--autoplay <on|off>]"
    );
    eprintln!("  cargo run -p app -- [options] streak <days>");
    eprintln!("  cargo run -p app -- [options] sync");
    eprintln!("  cargo run -p app -- [options] reset");
    eprintln!("  cargo run -p app -- [options] curriculum");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>          device database (default sqlite:tutor.sqlite3)");
    eprintln!("  --remote-db <sqlite_url>   database standing in for the remote service");
    eprintln!("  --user <id>                signed-in learner; omit for a local-only session");
    eprintln!("  --curriculum <path>        curriculum JSON (default: built-in)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  TUTOR_DB_URL, TUTOR_REMOTE_DB_URL, TUTOR_USER_ID, TUTOR_CURRICULUM, RUST_LOG");
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct PrefsUpdate {
    language: Option<String>,
    theme: Option<Theme>,
    font_size: Option<FontSize>,
    sound_enabled: Option<bool>,
    autoplay: Option<bool>,
}

impl PrefsUpdate {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn apply(self, mut prefs: Preferences) -> Preferences {
        if let Some(language) = self.language {
            prefs.language = language;
        }
        if let Some(theme) = self.theme {
            prefs.theme = theme;
        }
        if let Some(font_size) = self.font_size {
            prefs.font_size = font_size;
        }
        if let Some(sound) = self.sound_enabled {
            prefs.sound_enabled = sound;
        }
        if let Some(autoplay) = self.autoplay {
            prefs.autoplay = autoplay;
        }
        prefs
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Status,
    Complete {
        lesson: LessonId,
        score: u8,
        perfect: bool,
    },
    Badge(Option<BadgeId>),
    Prefs(PrefsUpdate),
    Streak(u32),
    Sync,
    Reset,
    Curriculum,
}

impl Command {
    fn parse(name: &str, rest: Vec<String>) -> Result<Self, ArgsError> {
        let mut args = rest.into_iter();
        let command = match name {
            "status" => Self::Status,
            "complete" => {
                let lesson = parse_value(require_positional(&mut args, "lesson-id")?, "lesson-id")?;
                let score = parse_value(require_positional(&mut args, "score")?, "score")?;
                let mut perfect = false;
                for arg in args.by_ref() {
                    match arg.as_str() {
                        "--perfect" => perfect = true,
                        _ => return Err(ArgsError::UnknownArg(arg)),
                    }
                }
                Self::Complete {
                    lesson,
                    score,
                    perfect,
                }
            }
            "badge" => match require_positional(&mut args, "badge-id")? {
                flag if flag == "--eligible" => Self::Badge(None),
                raw => Self::Badge(Some(parse_value(raw, "badge-id")?)),
            },
            "prefs" => Self::Prefs(parse_prefs(&mut args)?),
            "streak" => Self::Streak(parse_value(require_positional(&mut args, "days")?, "days")?),
            "sync" => Self::Sync,
            "reset" => Self::Reset,
            "curriculum" => Self::Curriculum,
            other => return Err(ArgsError::UnknownCommand(other.to_string())),
        };

        if let Some(extra) = args.next() {
            return Err(ArgsError::UnknownArg(extra));
        }
        Ok(command)
    }
}

fn parse_prefs(args: &mut impl Iterator<Item = String>) -> Result<PrefsUpdate, ArgsError> {
    let mut update = PrefsUpdate::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--language" => {
                let value = require_value(args, "--language")?;
                if value.trim().is_empty() {
                    return Err(ArgsError::InvalidValue {
                        flag: "--language",
                        raw: value,
                    });
                }
                update.language = Some(value.trim().to_string());
            }
            "--theme" => {
                let value = require_value(args, "--theme")?;
                update.theme = Some(match value.as_str() {
                    "light" => Theme::Light,
                    "dark" => Theme::Dark,
                    "high-contrast" => Theme::HighContrast,
                    _ => return Err(ArgsError::InvalidValue { flag: "--theme", raw: value }),
                });
            }
            "--font-size" => {
                let value = require_value(args, "--font-size")?;
                update.font_size = Some(match value.as_str() {
                    "small" => FontSize::Small,
                    "medium" => FontSize::Medium,
                    "large" => FontSize::Large,
                    _ => {
                        return Err(ArgsError::InvalidValue {
                            flag: "--font-size",
                            raw: value,
                        });
                    }
                });
            }
            "--sound" => update.sound_enabled = Some(parse_switch(args, "--sound")?),
            "--autoplay" => update.autoplay = Some(parse_switch(args, "--autoplay")?),
            _ => return Err(ArgsError::UnknownArg(arg)),
        }
    }
    Ok(update)
}

fn parse_switch(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<bool, ArgsError> {
    let value = require_value(args, flag)?;
    match value.as_str() {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        _ => Err(ArgsError::InvalidValue { flag, raw: value }),
    }
}

struct Args {
    db_url: String,
    remote_db_url: Option<String>,
    user: Option<UserId>,
    curriculum: Option<PathBuf>,
    command: Command,
}

impl Args {
    fn parse(args: impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("TUTOR_DB_URL")
            .ok()
            .map_or_else(|| normalize_sqlite_url("tutor.sqlite3".into()), normalize_sqlite_url);
        let mut remote_db_url = std::env::var("TUTOR_REMOTE_DB_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(normalize_sqlite_url);
        let mut user = std::env::var("TUTOR_USER_ID")
            .ok()
            .and_then(|value| value.parse::<UserId>().ok());
        let mut curriculum = std::env::var("TUTOR_CURRICULUM")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        let mut command_name = None;
        let mut rest = Vec::new();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--remote-db" => {
                    let value = require_value(&mut args, "--remote-db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    remote_db_url = Some(normalize_sqlite_url(value));
                }
                "--user" => {
                    let value = require_value(&mut args, "--user")?;
                    user = Some(parse_value(value, "--user")?);
                }
                "--curriculum" => {
                    curriculum = Some(PathBuf::from(require_value(&mut args, "--curriculum")?));
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ if command_name.is_none() && !arg.starts_with("--") => command_name = Some(arg),
                _ => rest.push(arg),
            }
        }

        let command = match command_name {
            Some(name) => Command::parse(&name, rest)?,
            None if rest.is_empty() => Command::Status,
            None => return Err(ArgsError::UnknownArg(rest.remove(0))),
        };

        Ok(Self {
            db_url,
            remote_db_url,
            user,
            curriculum,
            command,
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
            .unwrap_or_else(|_| PathBuf::from("."))
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

fn load_curriculum(path: Option<&PathBuf>) -> Result<Curriculum, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            Ok(Curriculum::from_json(&raw)?)
        }
        None => Ok(Curriculum::digital_literacy()),
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_status(manager: &ProgressManager) {
    let progress = manager.progress();
    println!("user:        {}", progress.user_id);
    println!("points:      {}", progress.total_points);
    println!("streak:      {} day(s)", progress.streak);
    match &progress.current_lesson {
        Some(lesson) => println!("current:     {lesson}"),
        None => println!("current:     -"),
    }
    if progress.earned_badges.is_empty() {
        println!("badges:      -");
    } else {
        let badges: Vec<&str> = progress.earned_badges.iter().map(BadgeId::as_str).collect();
        println!("badges:      {}", badges.join(", "));
    }
    println!();

    for module in manager.curriculum().modules() {
        println!("{} ({})", module.title, module.id);
        for lesson in &module.lessons {
            let marker = match manager.lesson_status(&lesson.id) {
                LessonStatus::Completed => "x",
                LessonStatus::Unlocked => " ",
                LessonStatus::Locked => "-",
            };
            match manager.get_lesson_score(&lesson.id) {
                Some(score) if score.attempts > 0 => println!(
                    "  [{marker}] {:<12} {}  ({}%, {} pts, {} attempt(s))",
                    lesson.id, lesson.title, score.score, score.points, score.attempts
                ),
                _ => println!("  [{marker}] {:<12} {}", lesson.id, lesson.title),
            }
        }
    }
}

fn print_curriculum(curriculum: &Curriculum) {
    for module in curriculum.modules() {
        println!("{} ({})", module.title, module.id);
        for lesson in &module.lessons {
            println!(
                "  {:<12} {}  [{} questions, pass at {}%]",
                lesson.id, lesson.title, lesson.quiz.total_questions, lesson.quiz.pass_threshold
            );
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let parsed = Args::parse(std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let curriculum = load_curriculum(parsed.curriculum.as_ref())?;
    if parsed.command == Command::Curriculum {
        print_curriculum(&curriculum);
        return Ok(());
    }

    prepare_sqlite_file(&parsed.db_url)?;
    if let Some(remote) = &parsed.remote_db_url {
        prepare_sqlite_file(remote)?;
    }
    let services = AppServices::new_sqlite(
        &parsed.db_url,
        parsed.remote_db_url.as_deref(),
        curriculum,
        Clock::system(),
    )
    .await?;

    let mut manager = services.progress_manager();
    manager.load(parsed.user.clone()).await;

    match parsed.command {
        Command::Status | Command::Curriculum => print_status(&manager),
        Command::Complete {
            lesson,
            score,
            perfect,
        } => {
            let done = manager.complete_lesson(&lesson, score, perfect).await?;
            println!(
                "{lesson}: {}% for {} points (attempt {})",
                done.score.score, done.score.points, done.score.attempts
            );
            if let Some(next) = &done.unlocked {
                println!("unlocked {next}");
            }
            for badge in manager.award_eligible_badges(&services.badges()).await {
                println!("earned badge {badge}");
            }
        }
        Command::Badge(Some(badge)) => {
            if services.badges().get(&badge).is_none() {
                tracing::warn!(badge_id = %badge, "badge is not in the standard catalog");
            }
            if manager.earn_badge(&badge).await {
                println!("earned badge {badge}");
            } else {
                println!("badge {badge} was already earned");
            }
        }
        Command::Badge(None) => {
            let awarded = manager.award_eligible_badges(&services.badges()).await;
            if awarded.is_empty() {
                println!("no new badges");
            }
            for badge in awarded {
                println!("earned badge {badge}");
            }
        }
        Command::Prefs(update) => {
            if !update.is_empty() {
                let prefs = update.apply(manager.progress().preferences.clone());
                manager
                    .update_progress(ProgressPatch::new().preferences(prefs))
                    .await;
            }
            let prefs = &manager.progress().preferences;
            println!("language:    {}", prefs.language);
            println!("theme:       {:?}", prefs.theme);
            println!("font size:   {:?}", prefs.font_size);
            println!("sound:       {}", prefs.sound_enabled);
            println!("autoplay:    {}", prefs.autoplay);
        }
        Command::Streak(days) => {
            manager.update_progress(ProgressPatch::new().streak(days)).await;
            println!("streak set to {days} day(s)");
        }
        Command::Sync => match manager.identity() {
            // `load` has already reconciled with the remote.
            Some(user) => println!(
                "synced {user}: {} lessons, {} points",
                manager.progress().completed_lessons.len(),
                manager.progress().total_points
            ),
            None => println!("no --user given; nothing to sync"),
        },
        Command::Reset => {
            manager.reset_progress().await;
            println!("local progress reset");
        }
    }

    manager.wait_for_sync().await;
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
