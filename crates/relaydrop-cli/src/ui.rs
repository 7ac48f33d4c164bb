//! Terminal rendering for Relaydrop CLI.

use std::io::{self, Write};

use relaydrop_core::display::{Notifier, Status, StatusDisplay};
use relaydrop_core::file::format_bytes;
use relaydrop_core::session::{ClientId, PresenceList, TransferOffer};

const BOX_WIDTH: usize = 41;
const BAR_WIDTH: usize = 30;

/// A formatted box announcing an incoming offer.
pub struct OfferBox<'a> {
    offer: &'a TransferOffer,
}

impl<'a> OfferBox<'a> {
    /// Create a box for `offer`.
    #[must_use]
    pub const fn new(offer: &'a TransferOffer) -> Self {
        Self { offer }
    }

    /// Lines of the box, without trailing newlines.
    pub fn lines(&self) -> Vec<String> {
        let from_line = format!("Incoming file from {}", self.offer.from);
        let file_line = format!("{} ({})", self.offer.name, format_bytes(self.offer.size));

        vec![
            format!("  ┌{}┐", "─".repeat(BOX_WIDTH)),
            format!("  │{}│", center_in_box(&from_line, BOX_WIDTH)),
            format!("  │{}│", center_in_box(&file_line, BOX_WIDTH)),
            format!("  │{}│", " ".repeat(BOX_WIDTH)),
            format!("  │{}│", center_in_box("accept: y   decline: n", BOX_WIDTH)),
            format!("  └{}┘", "─".repeat(BOX_WIDTH)),
        ]
    }
}

fn center_in_box(content: &str, width: usize) -> String {
    let content: String = content.chars().take(width).collect();
    let content_len = content.chars().count();
    let padding = width.saturating_sub(content_len);
    let left = padding / 2;
    let right = padding - left;
    format!("{}{}{}", " ".repeat(left), content, " ".repeat(right))
}

/// Render a `[#####.....]` bar for `percent`.
pub fn render_bar(percent: u8, width: usize) -> String {
    let percent = usize::from(percent.min(100));
    let filled = width * percent / 100;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(width - filled))
}

/// Status line, progress bar and banners on stdout.
#[derive(Debug, Default)]
pub struct TerminalDisplay {
    bar: Option<u8>,
}

impl TerminalDisplay {
    /// Create a display with no progress bar showing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn end_bar_line(&mut self) {
        if self.bar.take().is_some() {
            println!();
        }
    }
}

impl StatusDisplay for TerminalDisplay {
    fn status(&mut self, status: &Status) {
        if matches!(status, Status::Sending(_)) && self.bar.is_some() {
            return;
        }
        self.end_bar_line();
        println!("  {status}");
    }

    fn progress(&mut self, percent: u8) {
        if self.bar == Some(percent) {
            return;
        }
        self.bar = Some(percent);
        print!("\r  {} {:>3}%", render_bar(percent, BAR_WIDTH), percent);
        let _ = io::stdout().flush();
    }

    fn hide_progress(&mut self) {
        self.end_bar_line();
    }

    fn presence(&mut self, me: Option<&ClientId>, list: &PresenceList) {
        self.end_bar_line();
        let peers: Vec<&ClientId> = list.peers(me).collect();
        if peers.is_empty() {
            println!("  No other clients connected.");
            return;
        }
        println!("  Connected peers:");
        for peer in peers {
            println!("    {peer}");
        }
    }

    fn offer(&mut self, offer: &TransferOffer) {
        self.end_bar_line();
        println!();
        for line in OfferBox::new(offer).lines() {
            println!("{line}");
        }
        println!();
    }

    fn dismiss_offer(&mut self) {}

    fn notice(&mut self, message: &str) {
        self.end_bar_line();
        println!("  {message}");
    }
}

/// Rings the terminal bell.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl Notifier for TerminalBell {
    fn play(&mut self) -> io::Result<()> {
        let mut stdout = io::stdout();
        stdout.write_all(b"\x07")?;
        stdout.flush()
    }
}
