use std::io;
use std::time::{Duration, Instant};

use crossterm::event::Event;

use crate::drivers::InputDriver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlow {
    Continue,
    /// Keep going, but wake no later than this instant: a debounce or retry
    /// timer is due then.
    WaitUntil(Instant),
    Quit,
}

/// A centralized event loop that drives the main UI thread.
///
/// It owns the thread, polls the input driver and hands every event to a
/// handler. PTY readers run on their own threads and only fill buffers; all
/// canvas state is touched from here. Timers are cooperative: the handler
/// reports the next deadline and the poll timeout shrinks to meet it.
pub struct EventLoop<D> {
    driver: D,
    poll_interval: Duration,
}

impl<D: InputDriver> EventLoop<D> {
    pub fn new(driver: D, poll_interval: Duration) -> Self {
        Self {
            driver,
            poll_interval,
        }
    }

    pub fn driver(&mut self) -> &mut D {
        &mut self.driver
    }

    /// How long to block for input given the handler's wake-up request.
    pub fn poll_timeout(&self, flow: ControlFlow, now: Instant) -> Duration {
        match flow {
            ControlFlow::WaitUntil(deadline) => self
                .poll_interval
                .min(deadline.saturating_duration_since(now)),
            _ => self.poll_interval,
        }
    }

    /// Runs the application loop, taking control of the current thread.
    ///
    /// The `handler` is called with:
    /// - `Some(event)` when an input event occurs.
    /// - `None` once per iteration, before polling; this is where timers run
    ///   and the frame is drawn.
    pub fn run<F>(&mut self, mut handler: F) -> io::Result<()>
    where
        F: FnMut(&mut D, Option<Event>) -> io::Result<ControlFlow>,
    {
        loop {
            let flow = handler(&mut self.driver, None)?;
            if flow == ControlFlow::Quit {
                break;
            }

            let timeout = self.poll_timeout(flow, Instant::now());
            if self.driver.poll(timeout)? {
                // Drain the queue so drags and scrolls don't fall behind the
                // rendering loop.
                loop {
                    let event = self.driver.read()?;
                    if handler(&mut self.driver, Some(event))? == ControlFlow::Quit {
                        return Ok(());
                    }
                    if !self.driver.poll(Duration::from_millis(0))? {
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use std::collections::VecDeque;

    struct Scripted {
        events: VecDeque<Event>,
        timeouts: Vec<Duration>,
    }

    impl InputDriver for Scripted {
        fn poll(&mut self, timeout: Duration) -> io::Result<bool> {
            self.timeouts.push(timeout);
            Ok(!self.events.is_empty())
        }

        fn read(&mut self) -> io::Result<Event> {
            self.events
                .pop_front()
                .ok_or_else(|| io::Error::other("empty script"))
        }
    }

    fn key(c: char) -> Event {
        Event::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
    }

    #[test]
    fn deadline_shortens_poll_timeout() {
        let driver = Scripted {
            events: VecDeque::new(),
            timeouts: Vec::new(),
        };
        let lp = EventLoop::new(driver, Duration::from_millis(100));
        let now = Instant::now();
        let soon = now + Duration::from_millis(20);
        assert_eq!(
            lp.poll_timeout(ControlFlow::WaitUntil(soon), now),
            Duration::from_millis(20)
        );
        let past = now.checked_sub(Duration::from_millis(5)).unwrap_or(now);
        assert_eq!(
            lp.poll_timeout(ControlFlow::WaitUntil(past), now),
            Duration::ZERO
        );
        assert_eq!(
            lp.poll_timeout(ControlFlow::Continue, now),
            Duration::from_millis(100)
        );
    }

    #[test]
    fn run_drains_burst_then_quits() {
        let driver = Scripted {
            events: VecDeque::from(vec![key('a'), key('b'), key('q')]),
            timeouts: Vec::new(),
        };
        let mut lp = EventLoop::new(driver, Duration::from_millis(50));
        let mut seen = Vec::new();
        lp.run(|_, event| {
            Ok(match event {
                Some(Event::Key(k)) if k.code == KeyCode::Char('q') => ControlFlow::Quit,
                Some(Event::Key(k)) => {
                    seen.push(k.code);
                    ControlFlow::Continue
                }
                _ => ControlFlow::Continue,
            })
        })
        .unwrap();
        assert_eq!(seen, vec![KeyCode::Char('a'), KeyCode::Char('b')]);
        // One blocking poll for the burst, then zero-timeout drains.
        assert_eq!(lp.driver().timeouts[0], Duration::from_millis(50));
        assert_eq!(lp.driver().timeouts[1], Duration::ZERO);
    }
}
