// Copyright 2026 AppShelf Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{
    io::{self, BufRead, Write},
    sync::mpsc::{self, Receiver, Sender},
};

/// Yes/no questions asked in the middle of an operation.
pub trait Confirm {
    fn confirm(&mut self, question: &str) -> bool;
}

impl<F: FnMut(&str) -> bool> Confirm for F {
    fn confirm(&mut self, question: &str) -> bool {
        self(question)
    }
}

/// Answers yes without asking (`--yes`).
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&mut self, question: &str) -> bool {
        log::info!("{question} [assumed yes]");
        true
    }
}

/// Asks on the terminal. Anything but `y`/`yes` is a no, and so is a closed stdin.
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&mut self, question: &str) -> bool {
        eprint!("{question} [y/N] ");
        io::stderr().flush().ok();
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

/// Question travelling from a worker to whoever presents it.
pub struct ConfirmRequest {
    question: String,
    reply: Sender<bool>,
}

impl ConfirmRequest {
    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn answer(self, yes: bool) {
        // the worker may already be gone
        let _ = self.reply.send(yes);
    }
}

/// Worker-side confirmer. Blocks until the request is answered; a request
/// dropped unanswered, or a receiver that has gone away, counts as no.
pub struct ChannelConfirm {
    requests: Sender<ConfirmRequest>,
}

impl Confirm for ChannelConfirm {
    fn confirm(&mut self, question: &str) -> bool {
        let (reply, response) = mpsc::channel();
        let request = ConfirmRequest {
            question: question.to_string(),
            reply,
        };
        if self.requests.send(request).is_err() {
            log::debug!("No one to ask '{question}', assuming no");
            return false;
        }
        response.recv().unwrap_or(false)
    }
}

pub fn channel() -> (ChannelConfirm, Receiver<ConfirmRequest>) {
    let (requests, receiver) = mpsc::channel();
    (ChannelConfirm { requests }, receiver)
}

/// Answers requests with `confirm` until every worker-side sender is dropped.
pub fn serve(requests: Receiver<ConfirmRequest>, confirm: &mut dyn Confirm) {
    for request in requests {
        let yes = confirm.confirm(request.question());
        request.answer(yes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn answers_cross_threads() {
        let (mut asker, requests) = channel();
        let worker = thread::spawn(move || {
            let first = asker.confirm("overwrite a?");
            let second = asker.confirm("overwrite b?");
            (first, second)
        });

        let mut seen = Vec::new();
        serve(requests, &mut |q: &str| {
            seen.push(q.to_string());
            q.contains('a')
        });

        assert_eq!(worker.join().unwrap(), (true, false));
        assert_eq!(seen, ["overwrite a?", "overwrite b?"]);
    }

    #[test]
    fn dropped_request_is_no() {
        let (mut asker, requests) = channel();
        let worker = thread::spawn(move || asker.confirm("replace?"));
        for request in requests {
            drop(request);
        }
        assert!(!worker.join().unwrap());
    }

    #[test]
    fn missing_presenter_is_no() {
        let (mut asker, requests) = channel();
        drop(requests);
        assert!(!asker.confirm("replace?"));
    }
}
