//! Operator console: parses command lines and feeds the command queues.
//!
//! ```text
//! p <passkey>            reply to a passkey request (alias: passkey)
//! r <modifier> <keycode> send a keyboard report
//! m <buttons> <x> <y>    send a mouse report
//! t <text>               type text, one key press per character
//! cc <action>            consumer control (vol+, mute, play, ...)
//! db                     delete all bonds
//! lb                     list bonds
//! help                   this text
//! ```
//!
//! Numbers are decimal or `0x` hex. Values outside a field wrap to its
//! 8-bit width.

use core::future::Future;

use embassy_sync::blocking_mutex::raw::RawMutex;
use heapless::Vec;

use crate::config::CONSOLE_MAX_ARGS;
use crate::error::{Error, ParseError};
use crate::hid::ConsumerAction;
use crate::queues::{AdminCommand, Command, CommandQueues, KeyboardEvent, MouseEvent};

pub const HELP: &str = "\
p <passkey>             reply to a passkey request (alias: passkey)\r\n\
r <modifier> <keycode>  send a keyboard report\r\n\
m <buttons> <x> <y>     send a mouse report\r\n\
t <text>                type text\r\n\
cc <action>             consumer control: power assign last ch+ ch- play pause\r\n\
                        record ff rew next prev stop mute vol+ vol-\r\n\
db                      delete all bonds\r\n\
lb                      list bonds\r\n";

/// A parsed console line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsoleCommand<'a> {
    Passkey(u32),
    Keyboard { modifier: u8, keycode: u8 },
    Mouse { buttons: u8, x: i8, y: i8 },
    Text(&'a str),
    Consumer(ConsumerAction),
    DeleteBonds,
    ListBonds,
    Help,
}

/// What the console should tell the operator after a line ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reply {
    /// This many commands were queued.
    Queued(usize),
    /// Print [`HELP`].
    Help,
}

pub fn parse(line: &str) -> Result<ConsoleCommand<'_>, ParseError> {
    let line = line.trim();
    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim_start()),
        None => (line, ""),
    };

    match name {
        "" => Err(ParseError::Empty),
        // Text keeps its inner spacing, so it is not split into arguments.
        "t" => {
            if rest.is_empty() {
                Err(ParseError::ArgumentCount)
            } else {
                Ok(ConsoleCommand::Text(rest))
            }
        }
        _ => {
            let args = split_args(rest)?;
            parse_command(name, &args)
        }
    }
}

fn split_args(rest: &str) -> Result<Vec<&str, CONSOLE_MAX_ARGS>, ParseError> {
    let mut args = Vec::new();
    for arg in rest.split_whitespace() {
        args.push(arg).map_err(|_| ParseError::ArgumentCount)?;
    }
    Ok(args)
}

fn parse_command<'a>(name: &str, args: &[&str]) -> Result<ConsoleCommand<'a>, ParseError> {
    let cmd = match (name, args) {
        ("p" | "passkey", [value]) => {
            let value = parse_number(value)?;
            ConsoleCommand::Passkey(u32::try_from(value).map_err(|_| ParseError::InvalidNumber)?)
        }
        ("r", [modifier, keycode]) => ConsoleCommand::Keyboard {
            modifier: parse_number(modifier)? as u8,
            keycode: parse_number(keycode)? as u8,
        },
        ("m", [buttons, x, y]) => ConsoleCommand::Mouse {
            buttons: parse_number(buttons)? as u8,
            x: parse_number(x)? as i8,
            y: parse_number(y)? as i8,
        },
        ("cc", [action]) => ConsoleCommand::Consumer(
            ConsumerAction::from_name(action).ok_or(ParseError::UnknownAction)?,
        ),
        ("db", []) => ConsoleCommand::DeleteBonds,
        ("lb", []) => ConsoleCommand::ListBonds,
        ("help" | "?", []) => ConsoleCommand::Help,
        ("p" | "passkey" | "r" | "m" | "cc" | "db" | "lb" | "help" | "?", _) => {
            return Err(ParseError::ArgumentCount)
        }
        _ => return Err(ParseError::UnknownCommand),
    };
    Ok(cmd)
}

/// Parse a decimal (optionally negative) or `0x` hex number.
pub fn parse_number(s: &str) -> Result<i64, ParseError> {
    let (negative, digits) = match s.strip_prefix('-') {
        Some(d) => (true, d),
        None => (false, s),
    };
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => digits.parse::<i64>(),
    }
    .map_err(|_| ParseError::InvalidNumber)?;

    if magnitude < 0 {
        // "--5" and friends
        return Err(ParseError::InvalidNumber);
    }
    Ok(if negative { -magnitude } else { magnitude })
}

/// Queue the commands for `cmd`.
///
/// `deadline` produces the send timeout for each queued command; text
/// queues one command per character. If a queue stays full the error is
/// returned and the remaining characters are not queued.
pub async fn submit<M, F, D>(
    queues: &CommandQueues<M>,
    cmd: ConsoleCommand<'_>,
    mut deadline: F,
) -> Result<Reply, Error>
where
    M: RawMutex,
    F: FnMut() -> D,
    D: Future,
{
    let single = match cmd {
        ConsoleCommand::Passkey(v) => Command::PasskeyReply(v),
        ConsoleCommand::Keyboard { modifier, keycode } => {
            Command::Keyboard(KeyboardEvent { modifier, keycode })
        }
        ConsoleCommand::Mouse { buttons, x, y } => Command::Mouse(MouseEvent {
            buttons,
            dx: x,
            dy: y,
        }),
        ConsoleCommand::Consumer(action) => Command::Consumer(action),
        ConsoleCommand::DeleteBonds => Command::Admin(AdminCommand::DeleteAllBondings),
        ConsoleCommand::ListBonds => Command::Admin(AdminCommand::ListBondings),
        ConsoleCommand::Help => return Ok(Reply::Help),
        ConsoleCommand::Text(text) => {
            let mut queued = 0;
            for c in text.chars() {
                if let Err(e) = queues
                    .submit_within(Command::TypeCharacter(c), deadline())
                    .await
                {
                    warn!("text queue full after {} characters", queued);
                    return Err(e);
                }
                queued += 1;
            }
            return Ok(Reply::Queued(queued));
        }
    };

    queues.submit_within(single, deadline()).await?;
    debug!("queued {}", single);
    Ok(Reply::Queued(1))
}

/// Parse and queue one console line.
pub async fn run_line<M, F, D>(
    queues: &CommandQueues<M>,
    line: &str,
    deadline: F,
) -> Result<Reply, Error>
where
    M: RawMutex,
    F: FnMut() -> D,
    D: Future,
{
    let cmd = parse(line)?;
    submit(queues, cmd, deadline).await
}

#[cfg(test)]
mod tests {
    use core::future::ready;

    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    use super::*;

    fn now() -> core::future::Ready<()> {
        ready(())
    }

    #[test]
    fn passkey_and_alias() {
        assert_eq!(parse("p 123456"), Ok(ConsoleCommand::Passkey(123_456)));
        assert_eq!(parse("passkey 000042"), Ok(ConsoleCommand::Passkey(42)));
        assert_eq!(parse("p -1"), Err(ParseError::InvalidNumber));
    }

    #[test]
    fn keyboard_accepts_hex_and_decimal() {
        assert_eq!(
            parse("r 0x02 4"),
            Ok(ConsoleCommand::Keyboard {
                modifier: 2,
                keycode: 4
            })
        );
    }

    #[test]
    fn mouse_deltas_are_signed_and_wrap() {
        assert_eq!(
            parse("m 1 -5 10"),
            Ok(ConsoleCommand::Mouse {
                buttons: 1,
                x: -5,
                y: 10
            })
        );
        assert_eq!(
            parse("m 0 0xFB 300"),
            Ok(ConsoleCommand::Mouse {
                buttons: 0,
                x: -5,
                y: 44
            })
        );
    }

    #[test]
    fn text_keeps_inner_spaces() {
        assert_eq!(parse("t hello  world "), Ok(ConsoleCommand::Text("hello  world")));
        assert_eq!(parse("t"), Err(ParseError::ArgumentCount));
    }

    #[test]
    fn consumer_by_name() {
        assert_eq!(
            parse("cc vol+"),
            Ok(ConsoleCommand::Consumer(ConsumerAction::VolumeUp))
        );
        assert_eq!(parse("cc eject"), Err(ParseError::UnknownAction));
    }

    #[test]
    fn bad_lines() {
        assert_eq!(parse("   "), Err(ParseError::Empty));
        assert_eq!(parse("x 1"), Err(ParseError::UnknownCommand));
        assert_eq!(parse("r 1"), Err(ParseError::ArgumentCount));
        assert_eq!(parse("db now"), Err(ParseError::ArgumentCount));
        assert_eq!(parse("m 1 2 zz"), Err(ParseError::InvalidNumber));
        assert_eq!(parse("r 1 2 3 4 5 6 7 8 9"), Err(ParseError::ArgumentCount));
    }

    #[test]
    fn parse_number_forms() {
        assert_eq!(parse_number("0"), Ok(0));
        assert_eq!(parse_number("0X1f"), Ok(31));
        assert_eq!(parse_number("-0x10"), Ok(-16));
        assert_eq!(parse_number("--5"), Err(ParseError::InvalidNumber));
        assert_eq!(parse_number(""), Err(ParseError::InvalidNumber));
    }

    #[test]
    fn submit_queues_commands() {
        let q = CommandQueues::<NoopRawMutex>::new();
        assert_eq!(block_on(run_line(&q, "lb", now)), Ok(Reply::Queued(1)));
        assert_eq!(q.admin.try_receive(), Ok(AdminCommand::ListBondings));

        assert_eq!(block_on(run_line(&q, "t Hi", now)), Ok(Reply::Queued(2)));
        assert_eq!(q.text.try_receive(), Ok('H'));
        assert_eq!(q.text.try_receive(), Ok('i'));

        assert_eq!(block_on(run_line(&q, "help", now)), Ok(Reply::Help));
    }

    #[test]
    fn submit_reports_full_queue() {
        let q = CommandQueues::<NoopRawMutex>::new();
        block_on(run_line(&q, "p 1", now)).unwrap();
        assert_eq!(block_on(run_line(&q, "p 2", now)), Err(Error::QueueFull));
    }

    #[test]
    fn parse_errors_surface_as_errors() {
        let q = CommandQueues::<NoopRawMutex>::new();
        assert_eq!(
            block_on(run_line(&q, "bogus", now)),
            Err(Error::Parse(ParseError::UnknownCommand))
        );
    }
}
