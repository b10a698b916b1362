use std::fmt;

use ffmpeg_next::Rational;

/// Rational unit in which timestamps are expressed: one tick lasts
/// `num/den` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBase {
    pub num: i32,
    pub den: i32,
}

impl TimeBase {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Converts `ts` from this time base into `to`.
    ///
    /// Exact rational multiplication over i128 with round-to-nearest
    /// (half away from zero), matching what libavcodec does when packets
    /// move between codec and stream time bases. Order-preserving: a
    /// non-decreasing input sequence stays non-decreasing.
    pub fn rescale(self, ts: i64, to: TimeBase) -> i64 {
        let num = ts as i128 * self.num as i128 * to.den as i128;
        let den = self.den as i128 * to.num as i128;
        let half = den / 2;
        if num >= 0 {
            ((num + half) / den) as i64
        } else {
            ((num - half) / den) as i64
        }
    }
}

impl fmt::Display for TimeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl From<TimeBase> for Rational {
    fn from(tb: TimeBase) -> Rational {
        Rational(tb.num, tb.den)
    }
}

impl From<Rational> for TimeBase {
    fn from(r: Rational) -> TimeBase {
        TimeBase::new(r.numerator(), r.denominator())
    }
}
