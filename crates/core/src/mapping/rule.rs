use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Direction bits of a [`Mapping`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Inbound,
    Outbound,
    Both,
}

impl Direction {
    const INBOUND: u8 = 1;
    const OUTBOUND: u8 = 2;

    fn bits(self) -> u8 {
        match self {
            Direction::Inbound => Self::INBOUND,
            Direction::Outbound => Self::OUTBOUND,
            Direction::Both => Self::INBOUND | Self::OUTBOUND,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Direction::Inbound => "<",
            Direction::Outbound => ">",
            Direction::Both => "<>",
        }
    }
}

/// A path prefix rewrite between internal paths (`from`) and external URL
/// prefixes (`to`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mapping {
    from: String,
    to: String,
    direction: Direction,
}

impl Mapping {
    /// Maps every path onto itself in both directions.
    pub const DIRECT: Mapping = Mapping {
        from: String::new(),
        to: String::new(),
        direction: Direction::Both,
    };

    pub fn new(from: impl Into<String>, to: impl Into<String>, direction: Direction) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            direction,
        }
    }

    /// Parses `from:to` (both), `from>to` (outbound) or `from<to` (inbound).
    /// The separator occurring first wins; it must not be the first
    /// character. Without a separator the string maps onto itself.
    pub fn parse(config: &str) -> Self {
        let separator = config
            .char_indices()
            .skip(1)
            .find(|(_, c)| matches!(c, '>' | '<' | ':'));

        match separator {
            Some((idx, sep)) => {
                let direction = match sep {
                    '>' => Direction::Outbound,
                    '<' => Direction::Inbound,
                    _ => Direction::Both,
                };
                Self::new(&config[..idx], &config[idx + 1..], direction)
            }
            None => Self::new(config, config, Direction::Both),
        }
    }

    /// Maps an external URI to an internal path.
    pub fn map_uri(&self, uri: &str) -> Option<String> {
        if self.maps_inbound() {
            uri.strip_prefix(self.to.as_str())
                .map(|rest| format!("{}{}", self.from, rest))
        } else {
            None
        }
    }

    /// Maps an internal path (handle) to an external URI.
    pub fn map_handle(&self, handle: &str) -> Option<String> {
        if self.maps_outbound() {
            handle
                .strip_prefix(self.from.as_str())
                .map(|rest| format!("{}{}", self.to, rest))
        } else {
            None
        }
    }

    pub fn maps_inbound(&self) -> bool {
        self.direction.bits() & Direction::INBOUND != 0
    }

    pub fn maps_outbound(&self) -> bool {
        self.direction.bits() & Direction::OUTBOUND != 0
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

impl fmt::Display for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Mapping (from={}, to={}, direction={})",
            self.from,
            self.to,
            self.direction.symbol()
        )
    }
}

impl Serialize for Mapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let sep = match self.direction {
            Direction::Inbound => '<',
            Direction::Outbound => '>',
            Direction::Both => ':',
        };
        serializer.serialize_str(&format!("{}{}{}", self.from, sep, self.to))
    }
}

impl<'de> Deserialize<'de> for Mapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Mapping::parse(&s))
    }
}
