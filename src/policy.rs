use crate::record::SffRecord;

/// Placeholder emitted when a read's clip window is empty
pub const PLACEHOLDER_BASES: &[u8] = b"NNNN";

/// Quality scores emitted alongside [`PLACEHOLDER_BASES`]
pub const PLACEHOLDER_QUALITY: &[u8] = &[0; 4];

/// How the quality clip window is applied to text output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClipMode {
    /// Emit only the bases inside the window
    #[default]
    Trim,
    /// Emit every base, upper-casing the window and lower-casing the rest
    CaseFold,
}

/// Clip policy applied to every decoded read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClipPolicy {
    pub mode: ClipMode,

    /// Replaces the decoded left quality clip of every read when set
    pub left_override: Option<u16>,
}
impl ClipPolicy {
    #[must_use]
    pub fn new(mode: ClipMode, left_override: Option<u16>) -> Self {
        Self {
            mode,
            left_override,
        }
    }

    /// Applies the left clip override to a freshly decoded record
    pub fn adjust(&self, record: &mut SffRecord) {
        if let Some(left) = self.left_override {
            record.header.clip_qual_left = left;
        }
    }

    /// Whether reads are trimmed to their clip window
    #[must_use]
    pub fn is_trim(&self) -> bool {
        self.mode == ClipMode::Trim
    }

    /// Renders the bases of a record into `buf` according to the clip mode
    ///
    /// First clears the buffer.
    pub fn bases_into(&self, record: &SffRecord, buf: &mut Vec<u8>) {
        buf.clear();
        let window = ClipWindow::of(record);
        match self.mode {
            ClipMode::Trim => match window {
                ClipWindow::Range(start, end) => {
                    buf.extend_from_slice(&record.data.bases[start..end]);
                }
                ClipWindow::Degenerate => buf.extend_from_slice(PLACEHOLDER_BASES),
            },
            ClipMode::CaseFold => window.case_fold(&record.data.bases, buf),
        }
    }

    /// Quality scores of a record according to the clip mode
    #[must_use]
    pub fn quality<'a>(&self, record: &'a SffRecord) -> &'a [u8] {
        match self.mode {
            ClipMode::Trim => match ClipWindow::of(record) {
                ClipWindow::Range(start, end) => {
                    let quality = &record.data.quality;
                    &quality[start.min(quality.len())..end.min(quality.len())]
                }
                ClipWindow::Degenerate => PLACEHOLDER_QUALITY,
            },
            ClipMode::CaseFold => &record.data.quality,
        }
    }
}

/// The span of a read kept by its quality clip points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipWindow {
    /// Zero-based half-open range into the bases
    Range(usize, usize),
    /// Right clip before left clip; nothing usable remains
    Degenerate,
}
impl ClipWindow {
    /// Computes the window of a read from its 1-based left and right clip points
    ///
    /// A right clip of 0 means no right clip. The window is clamped to `len`.
    #[must_use]
    pub fn new(left: u16, right: u16, len: usize) -> Self {
        let start = (left.saturating_sub(1) as usize).min(len);
        if right < left {
            if right == 0 {
                Self::Range(start, len)
            } else {
                Self::Degenerate
            }
        } else if right != 0 {
            Self::Range(start, (start + (right - left) as usize).min(len))
        } else {
            Self::Range(start, len)
        }
    }

    /// The window of a decoded record
    #[must_use]
    pub fn of(record: &SffRecord) -> Self {
        Self::new(
            record.header.clip_qual_left,
            record.header.clip_qual_right,
            record.data.bases.len(),
        )
    }

    /// Number of bases inside the window
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Range(start, end) => end - start,
            Self::Degenerate => 0,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes `bases` into `buf`, upper-casing inside the window and lower-casing outside
    pub fn case_fold(&self, bases: &[u8], buf: &mut Vec<u8>) {
        buf.clear();
        let (start, end) = match *self {
            Self::Range(start, end) => (start, end),
            Self::Degenerate => (0, 0),
        };
        buf.extend(bases.iter().enumerate().map(|(i, b)| {
            if (start..end).contains(&i) {
                b.to_ascii_uppercase()
            } else {
                b.to_ascii_lowercase()
            }
        }));
    }
}
