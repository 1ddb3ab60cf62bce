mod action;
mod config;
mod hint;
mod text;

use anyhow::bail;
use clap::{ArgAction, Parser};
use config::Config;
use notify::{Notification, Session, Urgency};
use std::{
    cell::{Cell, RefCell},
    process::ExitCode,
    rc::Rc,
    time::Duration,
};

#[derive(Parser, Debug)]
#[command(
    name = "notify-send",
    version,
    about = "Create a notification",
    disable_help_flag = true,
    disable_version_flag = true
)]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Specifies the urgency level (low, normal, critical)"
    )]
    urgency: Option<Urgency>,

    #[arg(
        short = 't',
        long,
        value_name = "TIME",
        allow_negative_numbers = true,
        help = "Specifies the timeout in milliseconds at which to expire the notification"
    )]
    expire_time: Option<i32>,

    #[arg(short, long, help = "Specifies the app name for the icon")]
    app_name: Option<String>,

    #[arg(
        short,
        long,
        value_name = "ICON[,ICON...]",
        help = "Specifies an icon filename or stock icon to display"
    )]
    icon: Option<String>,

    #[arg(
        short,
        long,
        value_name = "TYPE[,TYPE...]",
        help = "Specifies the notification category"
    )]
    category: Option<String>,

    #[arg(
        short = 'h',
        long = "hint",
        value_name = "TYPE:NAME:VALUE",
        help = "Specifies basic extra data to pass. Valid types are int, double, string and byte"
    )]
    hints: Vec<String>,

    #[arg(
        short,
        long,
        help = "Wait for the notification to be closed before exiting"
    )]
    wait: bool,

    #[arg(
        short = 'A',
        long = "action",
        value_name = "[NAME=]TEXT",
        help = "Specifies the actions to display to the user. Implies --wait. The name of the invoked action is printed to stdout"
    )]
    actions: Vec<String>,

    #[arg(short = 'v', long, action = ArgAction::Version, help = "Version of the package")]
    version: Option<bool>,

    #[arg(long, action = ArgAction::Help, help = "Print help")]
    help: Option<bool>,

    #[arg(value_name = "SUMMARY [BODY]")]
    text: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = Config::load(None).unwrap_or_else(|e| {
        log::warn!("Failed to load config, using defaults: {e}");
        Config::default()
    });

    split_text(&cli.text)?;

    let session = Session::connect().await?;
    send(&cli, &config, &session).await
}

/// Summary and unescaped body from the positional arguments.
fn split_text(text: &[String]) -> anyhow::Result<(&str, Option<String>)> {
    match text {
        [summary, ..] if summary.is_empty() => bail!("No summary specified."),
        [] => bail!("No summary specified."),
        [summary] => Ok((summary, None)),
        [summary, body] => Ok((summary, Some(text::unescape(body)))),
        _ => bail!("Invalid number of options."),
    }
}

/// Shows the notification and waits for it when asked to. Fails the exit
/// status when the requested actions could not be offered.
async fn send(cli: &Cli, config: &Config, session: &Session) -> anyhow::Result<ExitCode> {
    let (summary, body) = split_text(&cli.text)?;
    let icon = cli
        .icon
        .as_deref()
        .map(|icons| icons.split_once(',').map_or(icons, |(first, _)| first));

    session.set_app_name(cli.app_name.as_deref().unwrap_or(&config.app_name));

    let mut notification = Notification::new(summary, body.as_deref(), icon)?;
    if let Some(category) = cli.category.as_deref().or(config.category.as_deref()) {
        notification.set_category(category)?;
    }
    notification.set_urgency(cli.urgency.unwrap_or(config.urgency))?;
    let expire_time = cli.expire_time.unwrap_or(config.expire_time);
    notification.set_timeout(expire_time);
    notification.set_session(session);

    for spec in &cli.hints {
        let (key, value) = hint::parse(spec)?;
        notification.set_hint(&key, value)?;
    }

    let mut wait = cli.wait && expire_time != 0;
    let mut code = ExitCode::SUCCESS;

    let invoked = Rc::new(RefCell::new(None));
    if !cli.actions.is_empty() {
        let capabilities = session.capabilities().await?;
        let supported = capabilities.is_empty()
            || capabilities
                .iter()
                .any(|capability| capability.eq_ignore_ascii_case("actions"));

        if supported {
            for (position, spec) in cli.actions.iter().enumerate() {
                let (name, label) = action::parse(position + 1, spec);
                let invoked = Rc::clone(&invoked);
                notification.add_action(
                    &name,
                    &label,
                    move |_, name, _| *invoked.borrow_mut() = Some(name.to_string()),
                    None,
                )?;
            }
            wait = true;
        } else {
            eprintln!(
                "Actions are not supported by this notifications server. Displaying non-interactively."
            );
            wait = false;
            code = ExitCode::FAILURE;
        }
    }

    let closed = Rc::new(Cell::new(false));
    if wait {
        let closed = Rc::clone(&closed);
        notification.connect_closed(move |_, _| closed.set(true));
    }

    notification.show().await?;

    if !wait {
        return Ok(code);
    }

    let until_done = wait_for_user(session, &invoked, &closed);
    if expire_time > 0 && cli.actions.is_empty() {
        let limit = Duration::from_millis(expire_time.unsigned_abs().into());
        match tokio::time::timeout(limit, until_done).await {
            Ok(result) => result?,
            Err(_) => log::debug!("Stopped waiting after {expire_time}ms"),
        }
    } else {
        until_done.await?;
    }

    Ok(code)
}

async fn wait_for_user(
    session: &Session,
    invoked: &RefCell<Option<String>>,
    closed: &Cell<bool>,
) -> anyhow::Result<()> {
    loop {
        let action = invoked.borrow_mut().take();
        if let Some(action) = action {
            println!("{action}");
            return Ok(());
        }

        if closed.get() {
            return Ok(());
        }

        if !session.process().await? {
            log::warn!("Notification server went away while waiting");
            return Ok(());
        }
    }
}
