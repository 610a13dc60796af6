use time::{Date, OffsetDateTime, UtcOffset};

/// Source of "now" for the engine. Lifecycle rules only ever see the
/// resulting `today`, which keeps them pure.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;

    fn today(&self) -> Date {
        self.now().date()
    }
}

/// Wall clock shifted into the user's configured offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: UtcOffset,
}

impl SystemClock {
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.offset)
    }
}

/// Clock pinned to one calendar day; the time of day still advances.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    today: Date,
    offset: UtcOffset,
}

impl FixedClock {
    pub fn new(today: Date, offset: UtcOffset) -> Self {
        Self { today, offset }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        let wall = OffsetDateTime::now_utc().to_offset(self.offset);
        wall.replace_date(self.today)
    }

    fn today(&self) -> Date {
        self.today
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, FixedClock, SystemClock};
    use time::macros::{date, offset};

    #[test]
    fn fixed_clock_reports_pinned_day() {
        let clock = FixedClock::new(date!(2025 - 01 - 03), offset!(-5));
        assert_eq!(clock.today(), date!(2025 - 01 - 03));
        assert_eq!(clock.now().date(), date!(2025 - 01 - 03));
        assert_eq!(clock.now().offset(), offset!(-5));
    }

    #[test]
    fn system_clock_uses_configured_offset() {
        let clock = SystemClock::new(offset!(+9));
        assert_eq!(clock.now().offset(), offset!(+9));
    }
}
