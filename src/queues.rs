//! Bounded command queues between the console (producer) and the dispatch
//! task (consumer).
//!
//! Each command class has its own channel, so a burst of mouse moves can
//! never hold up a passkey reply. Within a queue order is FIFO; across
//! queues there is no ordering.

use core::future::Future;

use embassy_futures::select::{select, select3, select4, Either, Either3, Either4};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;

use crate::config::{
    ADMIN_QUEUE_CAPACITY, CONSUMER_QUEUE_CAPACITY, KEYBOARD_QUEUE_CAPACITY, MOUSE_QUEUE_CAPACITY,
    PASSKEY_QUEUE_CAPACITY, TEXT_QUEUE_CAPACITY,
};
use crate::error::Error;
use crate::hid::ConsumerAction;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyboardEvent {
    pub modifier: u8,
    pub keycode: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MouseEvent {
    pub buttons: u8,
    pub dx: i8,
    pub dy: i8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdminCommand {
    DeleteAllBondings,
    ListBondings,
}

/// Everything the console can ask the BLE side to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    PasskeyReply(u32),
    Keyboard(KeyboardEvent),
    Mouse(MouseEvent),
    Admin(AdminCommand),
    Consumer(ConsumerAction),
    /// Type one character (press + release).
    TypeCharacter(char),
}

pub struct CommandQueues<M: RawMutex> {
    pub passkey: Channel<M, u32, PASSKEY_QUEUE_CAPACITY>,
    pub keyboard: Channel<M, KeyboardEvent, KEYBOARD_QUEUE_CAPACITY>,
    pub mouse: Channel<M, MouseEvent, MOUSE_QUEUE_CAPACITY>,
    pub admin: Channel<M, AdminCommand, ADMIN_QUEUE_CAPACITY>,
    pub consumer: Channel<M, ConsumerAction, CONSUMER_QUEUE_CAPACITY>,
    pub text: Channel<M, char, TEXT_QUEUE_CAPACITY>,
}

impl<M: RawMutex> CommandQueues<M> {
    pub const fn new() -> Self {
        Self {
            passkey: Channel::new(),
            keyboard: Channel::new(),
            mouse: Channel::new(),
            admin: Channel::new(),
            consumer: Channel::new(),
            text: Channel::new(),
        }
    }

    /// Enqueue without waiting. A full queue yields [`Error::QueueFull`].
    pub fn try_submit(&self, cmd: Command) -> Result<(), Error> {
        let sent = match cmd {
            Command::PasskeyReply(v) => self.passkey.try_send(v).is_ok(),
            Command::Keyboard(ev) => self.keyboard.try_send(ev).is_ok(),
            Command::Mouse(ev) => self.mouse.try_send(ev).is_ok(),
            Command::Admin(ev) => self.admin.try_send(ev).is_ok(),
            Command::Consumer(a) => self.consumer.try_send(a).is_ok(),
            Command::TypeCharacter(c) => self.text.try_send(c).is_ok(),
        };
        if sent {
            Ok(())
        } else {
            Err(Error::QueueFull)
        }
    }

    /// Enqueue, waiting for room until `deadline` completes.
    ///
    /// On target the deadline is an `embassy_time::Timer`; keeping it a plain
    /// future lets the core stay free of a time driver.
    pub async fn submit_within(&self, cmd: Command, deadline: impl Future) -> Result<(), Error> {
        let send = async {
            match cmd {
                Command::PasskeyReply(v) => self.passkey.send(v).await,
                Command::Keyboard(ev) => self.keyboard.send(ev).await,
                Command::Mouse(ev) => self.mouse.send(ev).await,
                Command::Admin(ev) => self.admin.send(ev).await,
                Command::Consumer(a) => self.consumer.send(a).await,
                Command::TypeCharacter(c) => self.text.send(c).await,
            }
        };
        match select(send, deadline).await {
            Either::First(()) => Ok(()),
            Either::Second(_) => Err(Error::QueueFull),
        }
    }

    /// Dequeue one command per queue, in dispatch order
    /// (passkey, keyboard, mouse, admin, consumer, text), calling `f` on each.
    /// Returns how many commands were taken.
    pub fn drain_round(&self, mut f: impl FnMut(Command)) -> usize {
        let taken = [
            self.passkey.try_receive().ok().map(Command::PasskeyReply),
            self.keyboard.try_receive().ok().map(Command::Keyboard),
            self.mouse.try_receive().ok().map(Command::Mouse),
            self.admin.try_receive().ok().map(Command::Admin),
            self.consumer.try_receive().ok().map(Command::Consumer),
            self.text.try_receive().ok().map(Command::TypeCharacter),
        ];
        let mut n = 0;
        for cmd in taken.into_iter().flatten() {
            f(cmd);
            n += 1;
        }
        n
    }

    /// Wait until any queue has a command. When several are ready the
    /// earlier queue in dispatch order wins.
    pub async fn next(&self) -> Command {
        let rest = select3(
            self.admin.receive(),
            self.consumer.receive(),
            self.text.receive(),
        );
        match select4(
            self.passkey.receive(),
            self.keyboard.receive(),
            self.mouse.receive(),
            rest,
        )
        .await
        {
            Either4::First(v) => Command::PasskeyReply(v),
            Either4::Second(ev) => Command::Keyboard(ev),
            Either4::Third(ev) => Command::Mouse(ev),
            Either4::Fourth(Either3::First(ev)) => Command::Admin(ev),
            Either4::Fourth(Either3::Second(a)) => Command::Consumer(a),
            Either4::Fourth(Either3::Third(c)) => Command::TypeCharacter(c),
        }
    }
}

impl<M: RawMutex> Default for CommandQueues<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use core::future::{pending, ready};

    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    use super::*;

    fn mouse(dx: i8) -> Command {
        Command::Mouse(MouseEvent {
            buttons: 0,
            dx,
            dy: 0,
        })
    }

    #[test]
    fn ninth_mouse_event_is_rejected() {
        let q = CommandQueues::<NoopRawMutex>::new();
        for i in 0..8 {
            q.try_submit(mouse(i)).unwrap();
        }
        assert_eq!(q.try_submit(mouse(8)), Err(Error::QueueFull));

        for i in 0..8 {
            assert_eq!(block_on(q.next()), mouse(i));
        }
    }

    #[test]
    fn submit_within_times_out_on_full_queue() {
        let q = CommandQueues::<NoopRawMutex>::new();
        block_on(q.submit_within(Command::PasskeyReply(1), pending::<()>())).unwrap();
        assert_eq!(
            block_on(q.submit_within(Command::PasskeyReply(2), ready(()))),
            Err(Error::QueueFull)
        );
        assert_eq!(q.passkey.try_receive(), Ok(1));
    }

    #[test]
    fn queues_are_independent() {
        let q = CommandQueues::<NoopRawMutex>::new();
        q.try_submit(Command::Admin(AdminCommand::ListBondings))
            .unwrap();
        assert_eq!(
            q.try_submit(Command::Admin(AdminCommand::DeleteAllBondings)),
            Err(Error::QueueFull)
        );
        // A full admin queue does not block other classes.
        q.try_submit(Command::PasskeyReply(123_456)).unwrap();
        q.try_submit(Command::TypeCharacter('x')).unwrap();
    }

    #[test]
    fn drain_round_takes_one_per_queue_in_order() {
        let q = CommandQueues::<NoopRawMutex>::new();
        q.try_submit(Command::TypeCharacter('a')).unwrap();
        q.try_submit(mouse(1)).unwrap();
        q.try_submit(mouse(2)).unwrap();
        q.try_submit(Command::PasskeyReply(42)).unwrap();

        let mut seen = heapless::Vec::<Command, 8>::new();
        assert_eq!(q.drain_round(|c| seen.push(c).unwrap()), 3);
        assert_eq!(
            seen[..],
            [Command::PasskeyReply(42), mouse(1), Command::TypeCharacter('a')]
        );

        seen.clear();
        assert_eq!(q.drain_round(|c| seen.push(c).unwrap()), 1);
        assert_eq!(seen[..], [mouse(2)]);
        assert_eq!(q.drain_round(|_| {}), 0);
    }

    #[test]
    fn next_prefers_earlier_queue() {
        let q = CommandQueues::<NoopRawMutex>::new();
        q.try_submit(Command::Consumer(ConsumerAction::Mute)).unwrap();
        q.try_submit(Command::Keyboard(KeyboardEvent {
            modifier: 0,
            keycode: 4,
        }))
        .unwrap();
        assert!(matches!(block_on(q.next()), Command::Keyboard(_)));
        assert_eq!(block_on(q.next()), Command::Consumer(ConsumerAction::Mute));
    }
}
