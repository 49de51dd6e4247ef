//! User-facing messages for the binary.
//! Prefixed lines ("ok:", "warn:", ...) colored only when stdout is a TTY.

use owo_colors::OwoColorize;

#[derive(Clone, Copy)]
enum Tag {
    Info,
    Ok,
    Warn,
    Error,
}

fn is_tty() -> bool {
    atty::is(atty::Stream::Stdout)
}

fn emit(tag: Tag, msg: &str) {
    let (label, to_stderr) = match tag {
        Tag::Info => ("info:", false),
        Tag::Ok => ("ok:", false),
        Tag::Warn => ("warn:", true),
        Tag::Error => ("error:", true),
    };
    let prefix = if is_tty() {
        match tag {
            Tag::Info => label.cyan().bold().to_string(),
            Tag::Ok => label.green().bold().to_string(),
            Tag::Warn => label.yellow().bold().to_string(),
            Tag::Error => label.red().bold().to_string(),
        }
    } else {
        label.to_string()
    };
    if to_stderr {
        eprintln!("{prefix} {msg}");
    } else {
        println!("{prefix} {msg}");
    }
}

pub fn print_info(msg: &str) {
    emit(Tag::Info, msg);
}

pub fn print_success(msg: &str) {
    emit(Tag::Ok, msg);
}

pub fn print_warn(msg: &str) {
    emit(Tag::Warn, msg);
}

pub fn print_error(msg: &str) {
    emit(Tag::Error, msg);
}
