#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub text: String,
    pub requires_turn_head: bool,
}

impl Message {
    pub fn new(text: impl Into<String>, requires_turn_head: bool) -> Self {
        Self {
            text: text.into(),
            requires_turn_head,
        }
    }
}

/// Where the next call to [`DialogScript::advance`] will read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextLine {
    At(usize),
    /// A repeatable script finished a full pass; the next advance is the rest tick.
    Resting,
    /// A play-once script finished; it never speaks again.
    Exhausted,
}

impl NextLine {
    fn at(index: usize, len: usize) -> Self {
        if index >= len {
            NextLine::Resting
        } else {
            NextLine::At(index)
        }
    }

    /// Maps the stored integer form (`-1`, `0..len`, `len`) onto a line.
    ///
    /// Out-of-range values are clamped; the flag reports whether that happened.
    pub fn from_stored(raw: i64, len: usize) -> (Self, bool) {
        match raw {
            -1 => (NextLine::Exhausted, false),
            raw if raw < -1 => (NextLine::Exhausted, true),
            raw => {
                let index = usize::try_from(raw).unwrap_or(usize::MAX);
                (NextLine::at(index, len), index > len)
            }
        }
    }

    pub fn to_stored(self, len: usize) -> i64 {
        match self {
            NextLine::At(index) => index as i64,
            NextLine::Resting => len as i64,
            NextLine::Exhausted => -1,
        }
    }

    fn as_current(self, len: usize) -> Option<usize> {
        match self {
            NextLine::At(index) => Some(index),
            NextLine::Resting => Some(len),
            NextLine::Exhausted => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialogCursor {
    pub next: NextLine,
    /// Index of the last message read, `None` once exhausted.
    pub current: Option<usize>,
}

impl DialogCursor {
    pub fn fresh() -> Self {
        Self {
            next: NextLine::At(0),
            current: Some(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogScript {
    messages: Vec<Message>,
    play_once: bool,
    cursor: DialogCursor,
}

impl DialogScript {
    /// A play-once script with no messages starts out exhausted.
    pub fn new(messages: Vec<Message>, play_once: bool) -> Self {
        let cursor = if play_once && messages.is_empty() {
            DialogCursor {
                next: NextLine::Exhausted,
                current: None,
            }
        } else {
            DialogCursor {
                next: NextLine::at(0, messages.len()),
                current: Some(0),
            }
        };
        Self {
            messages,
            play_once,
            cursor,
        }
    }

    pub fn with_cursor(messages: Vec<Message>, play_once: bool, cursor: DialogCursor) -> Self {
        Self {
            messages,
            play_once,
            cursor,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn play_once(&self) -> bool {
        self.play_once
    }

    pub fn cursor(&self) -> DialogCursor {
        self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor.next == NextLine::Exhausted
    }

    /// Reads the next line and moves the cursor.
    ///
    /// A repeatable script yields `None` once between passes (the rest tick);
    /// an exhausted play-once script yields `None` forever.
    pub fn advance(&mut self) -> Option<&str> {
        let len = self.messages.len();
        self.cursor.current = self.cursor.next.as_current(len);

        let index = match self.cursor.next {
            NextLine::Exhausted => return None,
            NextLine::At(index) if index < len => index,
            NextLine::Resting | NextLine::At(_) => {
                self.cursor.next = if self.play_once {
                    NextLine::Exhausted
                } else {
                    NextLine::at(0, len)
                };
                return None;
            }
        };

        let following = index + 1;
        self.cursor.next = if following < len {
            NextLine::At(following)
        } else if self.play_once {
            NextLine::Exhausted
        } else {
            NextLine::Resting
        };
        self.messages.get(index).map(|message| message.text.as_str())
    }

    pub fn current_message(&self) -> Option<&Message> {
        self.cursor
            .current
            .and_then(|index| self.messages.get(index))
    }

    /// Same content with the cursor rewound to the first line.
    pub fn fresh_copy(&self) -> Self {
        Self::new(self.messages.clone(), self.play_once)
    }
}
