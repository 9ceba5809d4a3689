//! XML Schema builtin datatypes and facets
//!
//! Shared by the XSD validator and RelaxNG `data`/`value` patterns. Lexical
//! forms are checked by small hand-written scanners; `pattern` facets go
//! through `regex` after translating the XSD-only escapes.

use std::cmp::Ordering;

use regex::Regex;
use time::util::days_in_year_month;
use time::Month;

/// `whiteSpace` facet values
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WhiteSpace {
    Preserve,
    Replace,
    Collapse,
}

impl WhiteSpace {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "preserve" => Some(Self::Preserve),
            "replace" => Some(Self::Replace),
            "collapse" => Some(Self::Collapse),
            _ => None,
        }
    }

    pub fn apply(self, value: &str) -> String {
        match self {
            Self::Preserve => value.to_string(),
            Self::Replace => value
                .chars()
                .map(|c| if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c })
                .collect(),
            Self::Collapse => value.split_ascii_whitespace().collect::<Vec<_>>().join(" "),
        }
    }
}

macro_rules! builtins {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// Builtin datatypes of XML Schema part 2
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum Builtin {
            $($variant),*
        }

        impl Builtin {
            /// Builtin by its local name in the XML Schema namespace
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Self::$variant),)*
                    _ => None,
                }
            }

            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name),*
                }
            }
        }
    };
}

builtins! {
    AnyType => "anyType",
    AnySimpleType => "anySimpleType",
    String => "string",
    NormalizedString => "normalizedString",
    Token => "token",
    Language => "language",
    Name => "Name",
    NcName => "NCName",
    Id => "ID",
    IdRef => "IDREF",
    IdRefs => "IDREFS",
    Entity => "ENTITY",
    Entities => "ENTITIES",
    NmToken => "NMTOKEN",
    NmTokens => "NMTOKENS",
    Boolean => "boolean",
    Decimal => "decimal",
    Integer => "integer",
    NonPositiveInteger => "nonPositiveInteger",
    NegativeInteger => "negativeInteger",
    Long => "long",
    Int => "int",
    Short => "short",
    Byte => "byte",
    NonNegativeInteger => "nonNegativeInteger",
    UnsignedLong => "unsignedLong",
    UnsignedInt => "unsignedInt",
    UnsignedShort => "unsignedShort",
    UnsignedByte => "unsignedByte",
    PositiveInteger => "positiveInteger",
    Float => "float",
    Double => "double",
    Duration => "duration",
    DateTime => "dateTime",
    Date => "date",
    Time => "time",
    GYear => "gYear",
    GYearMonth => "gYearMonth",
    GMonth => "gMonth",
    GMonthDay => "gMonthDay",
    GDay => "gDay",
    AnyUri => "anyURI",
    QName => "QName",
    Notation => "NOTATION",
    Base64Binary => "base64Binary",
    HexBinary => "hexBinary",
}

/// How values of a type are ordered for range facets
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Order {
    Numeric,
    Temporal,
    Unordered,
}

impl Builtin {
    pub const fn whitespace(self) -> WhiteSpace {
        match self {
            Self::String | Self::AnyType | Self::AnySimpleType => WhiteSpace::Preserve,
            Self::NormalizedString => WhiteSpace::Replace,
            _ => WhiteSpace::Collapse,
        }
    }

    /// Item type of the builtin list types
    pub const fn list_item(self) -> Option<Self> {
        match self {
            Self::IdRefs => Some(Self::IdRef),
            Self::Entities => Some(Self::Entity),
            Self::NmTokens => Some(Self::NmToken),
            _ => None,
        }
    }

    const fn order(self) -> Order {
        match self {
            Self::Decimal
            | Self::Integer
            | Self::NonPositiveInteger
            | Self::NegativeInteger
            | Self::Long
            | Self::Int
            | Self::Short
            | Self::Byte
            | Self::NonNegativeInteger
            | Self::UnsignedLong
            | Self::UnsignedInt
            | Self::UnsignedShort
            | Self::UnsignedByte
            | Self::PositiveInteger
            | Self::Float
            | Self::Double => Order::Numeric,
            Self::DateTime
            | Self::Date
            | Self::Time
            | Self::GYear
            | Self::GYearMonth
            | Self::GMonth
            | Self::GMonthDay
            | Self::GDay
            | Self::Duration => Order::Temporal,
            _ => Order::Unordered,
        }
    }

    /// Whether an already whitespace-normalized value is in the lexical
    /// space of the type
    pub fn is_lexical(self, value: &str) -> bool {
        match self {
            Self::AnyType | Self::AnySimpleType | Self::String | Self::AnyUri => true,
            Self::NormalizedString => !value.contains(['\t', '\n', '\r']),
            Self::Token => {
                !value.starts_with(' ') && !value.ends_with(' ') && !value.contains("  ")
            }
            Self::Language => is_language(value),
            Self::Name => is_name(value),
            Self::NcName | Self::Id | Self::IdRef | Self::Entity => is_ncname(value),
            Self::NmToken => !value.is_empty() && value.chars().all(is_name_char),
            Self::IdRefs | Self::Entities | Self::NmTokens => {
                let item = self.list_item().unwrap_or(Self::String);
                let mut items = value.split(' ').peekable();
                items.peek().is_some() && items.all(|v| item.is_lexical(v))
            }
            Self::Boolean => matches!(value, "true" | "false" | "1" | "0"),
            Self::Decimal => is_decimal(value),
            Self::Float | Self::Double => is_float(value),
            Self::Integer => is_integer(value),
            Self::NonPositiveInteger => is_integer(value) && integer_sign(value) <= 0,
            Self::NegativeInteger => is_integer(value) && integer_sign(value) < 0,
            Self::NonNegativeInteger => is_integer(value) && integer_sign(value) >= 0,
            Self::PositiveInteger => is_integer(value) && integer_sign(value) > 0,
            Self::Long => is_integer(value) && value.parse::<i64>().is_ok(),
            Self::Int => is_integer(value) && value.parse::<i32>().is_ok(),
            Self::Short => is_integer(value) && value.parse::<i16>().is_ok(),
            Self::Byte => is_integer(value) && value.parse::<i8>().is_ok(),
            Self::UnsignedLong => is_unsigned(value, |v| v.parse::<u64>().is_ok()),
            Self::UnsignedInt => is_unsigned(value, |v| v.parse::<u32>().is_ok()),
            Self::UnsignedShort => is_unsigned(value, |v| v.parse::<u16>().is_ok()),
            Self::UnsignedByte => is_unsigned(value, |v| v.parse::<u8>().is_ok()),
            Self::Duration => is_duration(value),
            Self::DateTime => value
                .split_once('T')
                .is_some_and(|(date, time)| date_part(date) == Some("") && time_part(time)),
            Self::Date => date_part(value).is_some_and(timezone),
            Self::Time => time_part(value),
            Self::GYear => year(value).is_some_and(|(_, rest)| timezone(rest)),
            Self::GYearMonth => year_month(value).is_some_and(|(_, _, rest)| timezone(rest)),
            Self::GMonth => value
                .strip_prefix("--")
                .and_then(|v| two_digits(v, 1, 12))
                .is_some_and(|(_, rest)| timezone(rest)),
            Self::GMonthDay => value
                .strip_prefix("--")
                .and_then(|v| two_digits(v, 1, 12))
                .and_then(|(month, rest)| {
                    let (day, rest) = two_digits(rest.strip_prefix('-')?, 1, 31)?;
                    valid_day(2000, month, day).then_some(rest)
                })
                .is_some_and(timezone),
            Self::GDay => value
                .strip_prefix("---")
                .and_then(|v| two_digits(v, 1, 31))
                .is_some_and(|(_, rest)| timezone(rest)),
            Self::QName | Self::Notation => match value.split_once(':') {
                Some((prefix, local)) => is_ncname(prefix) && is_ncname(local),
                None => is_ncname(value),
            },
            Self::Base64Binary => is_base64(value),
            Self::HexBinary => {
                value.len() % 2 == 0 && value.bytes().all(|b| b.is_ascii_hexdigit())
            }
        }
    }

    /// Length in the units the length facets count
    fn length(self, value: &str) -> usize {
        match self {
            Self::HexBinary => value.len() / 2,
            Self::Base64Binary => {
                let chars: Vec<u8> = value.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
                let padding = chars.iter().rev().take_while(|b| **b == b'=').count();
                (chars.len() / 4 * 3).saturating_sub(padding)
            }
            Self::IdRefs | Self::Entities | Self::NmTokens => value.split(' ').count(),
            _ => value.chars().count(),
        }
    }

    /// Compare two lexically valid values in the value space
    fn compare(self, a: &str, b: &str) -> Option<Ordering> {
        match self.order() {
            Order::Numeric => number(a).partial_cmp(&number(b)),
            Order::Temporal => Some(a.cmp(b)),
            Order::Unordered => None,
        }
    }

    /// Equality in the value space
    pub fn equal(self, a: &str, b: &str) -> bool {
        let a = self.whitespace().apply(a);
        let b = self.whitespace().apply(b);
        match self {
            Self::Boolean => matches!(a.as_str(), "true" | "1") == matches!(b.as_str(), "true" | "1"),
            _ if self.order() == Order::Numeric => {
                self.is_lexical(&a) && self.is_lexical(&b) && number(&a) == number(&b)
            }
            _ => a == b,
        }
    }
}

/// Constraining facet of a restriction
#[derive(Clone, Debug)]
pub enum Facet {
    Enumeration(Vec<String>),
    /// Alternatives from one derivation step; a value must match one
    Pattern {
        sources: Vec<String>,
        regexes: Vec<Regex>,
    },
    Length(usize),
    MinLength(usize),
    MaxLength(usize),
    MinInclusive(String),
    MaxInclusive(String),
    MinExclusive(String),
    MaxExclusive(String),
    TotalDigits(usize),
    FractionDigits(usize),
    WhiteSpace(WhiteSpace),
}

impl Facet {
    /// Build a facet from its element name and `value` attribute
    pub fn parse(name: &str, value: &str) -> Result<Self, String> {
        let size = || {
            value
                .trim()
                .parse::<usize>()
                .map_err(|_| format!("Invalid value '{value}' for facet '{name}'"))
        };
        Ok(match name {
            "enumeration" => Self::Enumeration(vec![value.to_string()]),
            "pattern" => Self::pattern(vec![value.to_string()])?,
            "length" => Self::Length(size()?),
            "minLength" => Self::MinLength(size()?),
            "maxLength" => Self::MaxLength(size()?),
            "minInclusive" => Self::MinInclusive(value.trim().to_string()),
            "maxInclusive" => Self::MaxInclusive(value.trim().to_string()),
            "minExclusive" => Self::MinExclusive(value.trim().to_string()),
            "maxExclusive" => Self::MaxExclusive(value.trim().to_string()),
            "totalDigits" => Self::TotalDigits(size()?),
            "fractionDigits" => Self::FractionDigits(size()?),
            "whiteSpace" => Self::WhiteSpace(
                WhiteSpace::parse(value.trim())
                    .ok_or_else(|| format!("Invalid value '{value}' for facet 'whiteSpace'"))?,
            ),
            other => return Err(format!("Unsupported facet '{other}'")),
        })
    }

    pub fn pattern(sources: Vec<String>) -> Result<Self, String> {
        let regexes = sources
            .iter()
            .map(|source| {
                Regex::new(&format!("^(?:{})$", translate_pattern(source)))
                    .map_err(|err| format!("Invalid pattern '{source}': {err}"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::Pattern { sources, regexes })
    }

    /// Merge facets declared in the same restriction: enumerations and
    /// patterns accumulate as alternatives
    pub fn merge(facets: Vec<Self>) -> Vec<Self> {
        let mut merged: Vec<Self> = Vec::new();
        for facet in facets {
            let kind = std::mem::discriminant(&facet);
            let slot = merged
                .iter_mut()
                .find(|f| same_kind_alternatives(f) && std::mem::discriminant(*f) == kind);
            match (facet, slot) {
                (Self::Enumeration(values), Some(Self::Enumeration(existing))) => {
                    existing.extend(values);
                }
                (
                    Self::Pattern { sources, regexes },
                    Some(Self::Pattern {
                        sources: existing_sources,
                        regexes: existing_regexes,
                    }),
                ) => {
                    existing_sources.extend(sources);
                    existing_regexes.extend(regexes);
                }
                (facet, _) => merged.push(facet),
            }
        }
        merged
    }

    fn check(&self, base: Builtin, value: &str) -> Result<(), String> {
        match self {
            Self::Enumeration(values) => {
                if values.iter().any(|v| base.equal(v, value)) {
                    return Ok(());
                }
                let set = values
                    .iter()
                    .map(|v| format!("'{v}'"))
                    .collect::<Vec<_>>()
                    .join(", ");
                Err(format!(
                    "[facet 'enumeration'] The value '{value}' is not an element of the set {{{set}}}."
                ))
            }
            Self::Pattern { sources, regexes } => {
                if regexes.iter().any(|re| re.is_match(value)) {
                    return Ok(());
                }
                Err(format!(
                    "[facet 'pattern'] The value '{value}' is not accepted by the pattern '{}'.",
                    sources.join("|")
                ))
            }
            Self::Length(_) | Self::MinLength(_) | Self::MaxLength(_) => {
                self.check_length(base.length(value))
            }
            Self::MinInclusive(bound) => match base.compare(value, bound) {
                Some(Ordering::Less) => Err(format!(
                    "[facet 'minInclusive'] The value '{value}' is less than the minimum value allowed ('{bound}')."
                )),
                _ => Ok(()),
            },
            Self::MaxInclusive(bound) => match base.compare(value, bound) {
                Some(Ordering::Greater) => Err(format!(
                    "[facet 'maxInclusive'] The value '{value}' is greater than the maximum value allowed ('{bound}')."
                )),
                _ => Ok(()),
            },
            Self::MinExclusive(bound) => match base.compare(value, bound) {
                Some(Ordering::Greater) | None => Ok(()),
                _ => Err(format!(
                    "[facet 'minExclusive'] The value '{value}' must be greater than '{bound}'."
                )),
            },
            Self::MaxExclusive(bound) => match base.compare(value, bound) {
                Some(Ordering::Less) | None => Ok(()),
                _ => Err(format!(
                    "[facet 'maxExclusive'] The value '{value}' must be less than '{bound}'."
                )),
            },
            Self::TotalDigits(n) => {
                if decimal_digits(value).0 <= *n {
                    return Ok(());
                }
                Err(format!(
                    "[facet 'totalDigits'] The value '{value}' has more digits than are allowed ('{n}')."
                ))
            }
            Self::FractionDigits(n) => {
                if decimal_digits(value).1 <= *n {
                    return Ok(());
                }
                Err(format!(
                    "[facet 'fractionDigits'] The value '{value}' has more fractional digits than are allowed ('{n}')."
                ))
            }
            Self::WhiteSpace(_) => Ok(()),
        }
    }
}

impl Facet {
    /// Length facets against a length already measured in the right units
    fn check_length(&self, len: usize) -> Result<(), String> {
        match self {
            Self::Length(n) if len != *n => Err(format!(
                "[facet 'length'] The value has a length of '{len}'; this differs from the allowed length of '{n}'."
            )),
            Self::MinLength(n) if len < *n => Err(format!(
                "[facet 'minLength'] The value has a length of '{len}'; this underruns the allowed minimum length of '{n}'."
            )),
            Self::MaxLength(n) if len > *n => Err(format!(
                "[facet 'maxLength'] The value has a length of '{len}'; this exceeds the allowed maximum length of '{n}'."
            )),
            _ => Ok(()),
        }
    }
}

fn same_kind_alternatives(facet: &Facet) -> bool {
    matches!(facet, Facet::Enumeration(_) | Facet::Pattern { .. })
}

/// A simple type: a restricted builtin, a list or a union
#[derive(Clone, Debug)]
pub enum SimpleType {
    Atomic {
        base: Builtin,
        facets: Vec<Facet>,
    },
    List {
        item: Box<SimpleType>,
        facets: Vec<Facet>,
    },
    Union(Vec<SimpleType>),
}

impl SimpleType {
    pub fn builtin(base: Builtin) -> Self {
        match base.list_item() {
            Some(item) => Self::List {
                item: Box::new(Self::builtin(item)),
                facets: vec![Facet::MinLength(1)],
            },
            None => Self::Atomic {
                base,
                facets: Vec::new(),
            },
        }
    }

    /// Derive by restriction, adding `facets` to the ones inherited
    #[must_use]
    pub fn restrict(self, facets: Vec<Facet>) -> Self {
        match self {
            Self::Atomic {
                base,
                facets: mut inherited,
            } => {
                inherited.extend(facets);
                Self::Atomic {
                    base,
                    facets: inherited,
                }
            }
            Self::List {
                item,
                facets: mut inherited,
            } => {
                inherited.extend(facets);
                Self::List {
                    item,
                    facets: inherited,
                }
            }
            // facets on a union only support enumeration and pattern; they
            // are checked against each member
            Self::Union(members) => Self::Union(
                members
                    .into_iter()
                    .map(|member| member.restrict(facets.clone()))
                    .collect(),
            ),
        }
    }

    fn whitespace(&self) -> WhiteSpace {
        match self {
            Self::Atomic { base, facets } => facets
                .iter()
                .rev()
                .find_map(|f| match f {
                    Facet::WhiteSpace(ws) => Some(*ws),
                    _ => None,
                })
                .unwrap_or_else(|| base.whitespace()),
            Self::List { .. } | Self::Union(_) => WhiteSpace::Collapse,
        }
    }

    /// Check a raw value, returning it whitespace-normalized
    pub fn validate(&self, raw: &str) -> Result<String, String> {
        let value = self.whitespace().apply(raw);
        match self {
            Self::Atomic { base, facets } => {
                if !base.is_lexical(&value) {
                    return Err(format!(
                        "'{value}' is not a valid value of the atomic type 'xs:{}'.",
                        base.name()
                    ));
                }
                for facet in facets {
                    facet.check(*base, &value)?;
                }
            }
            Self::List { item, facets } => {
                let items: Vec<&str> = value.split(' ').filter(|v| !v.is_empty()).collect();
                for entry in &items {
                    item.validate(entry).map_err(|_| {
                        format!("'{value}' is not a valid value of the list type.")
                    })?;
                }
                for facet in facets {
                    match facet {
                        Facet::Length(_) | Facet::MinLength(_) | Facet::MaxLength(_) => {
                            facet.check_length(items.len())?;
                        }
                        _ => facet.check(Builtin::String, &value)?,
                    }
                }
            }
            Self::Union(members) => {
                if !members.iter().any(|member| member.validate(&value).is_ok()) {
                    return Err(format!(
                        "'{value}' is not a valid value of the union type."
                    ));
                }
            }
        }
        Ok(value)
    }

    /// Value-space equality, used by enumerations and RelaxNG `value`
    pub fn equal(&self, a: &str, b: &str) -> bool {
        match self {
            Self::Atomic { base, .. } => base.equal(a, b),
            Self::List { .. } | Self::Union(_) => {
                WhiteSpace::Collapse.apply(a) == WhiteSpace::Collapse.apply(b)
            }
        }
    }
}

/// Translate XSD-only regex escapes into `regex` syntax
fn translate_pattern(source: &str) -> String {
    const NAME_START: &str = "_:A-Za-z\\u{C0}-\\u{2FF}\\u{370}-\\u{1FFF}\\u{200C}-\\u{200D}\\u{2070}-\\u{218F}\\u{2C00}-\\u{2FEF}\\u{3001}-\\u{D7FF}\\u{F900}-\\u{FDCF}\\u{FDF0}-\\u{FFFD}";
    let name_char = format!("{NAME_START}\\-.0-9\\u{{B7}}\\u{{300}}-\\u{{36F}}\\u{{203F}}-\\u{{2040}}");
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('i') => out.push_str(&format!("[{NAME_START}]")),
            Some('I') => out.push_str(&format!("[^{NAME_START}]")),
            Some('c') => out.push_str(&format!("[{name_char}]")),
            Some('C') => out.push_str(&format!("[^{name_char}]")),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

pub fn is_ncname(value: &str) -> bool {
    is_name(value) && !value.contains(':')
}

pub fn is_name(value: &str) -> bool {
    let mut chars = value.chars();
    chars.next().is_some_and(is_name_start) && chars.all(is_name_char)
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == ':'
}

fn is_name_char(c: char) -> bool {
    is_name_start(c) || c.is_ascii_digit() || matches!(c, '-' | '.' | '\u{B7}') || c.is_numeric()
}

fn is_language(value: &str) -> bool {
    let mut parts = value.split('-');
    let primary = parts.next().unwrap_or_default();
    let valid_part = |p: &str, alpha_only: bool| {
        (1..=8).contains(&p.len())
            && p.bytes().all(|b| {
                if alpha_only {
                    b.is_ascii_alphabetic()
                } else {
                    b.is_ascii_alphanumeric()
                }
            })
    };
    valid_part(primary, true) && parts.all(|p| valid_part(p, false))
}

fn strip_sign(value: &str) -> &str {
    value
        .strip_prefix('+')
        .or_else(|| value.strip_prefix('-'))
        .unwrap_or(value)
}

fn all_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

fn is_integer(value: &str) -> bool {
    all_digits(strip_sign(value))
}

/// -1, 0 or 1 for a lexically valid integer
fn integer_sign(value: &str) -> i8 {
    if strip_sign(value).bytes().all(|b| b == b'0') {
        0
    } else if value.starts_with('-') {
        -1
    } else {
        1
    }
}

fn is_unsigned(value: &str, fits: impl Fn(&str) -> bool) -> bool {
    is_integer(value) && (integer_sign(value) == 0 || (!value.starts_with('-') && fits(value)))
}

fn is_decimal(value: &str) -> bool {
    let unsigned = strip_sign(value);
    match unsigned.split_once('.') {
        Some((int, frac)) => {
            (int.is_empty() || all_digits(int))
                && (frac.is_empty() || all_digits(frac))
                && !(int.is_empty() && frac.is_empty())
        }
        None => all_digits(unsigned),
    }
}

fn is_float(value: &str) -> bool {
    if matches!(value, "INF" | "-INF" | "+INF" | "NaN") {
        return true;
    }
    match value.split_once(['e', 'E']) {
        Some((mantissa, exponent)) => is_decimal(mantissa) && is_integer(exponent),
        None => is_decimal(value),
    }
}

fn number(value: &str) -> f64 {
    match value {
        "INF" | "+INF" => f64::INFINITY,
        "-INF" => f64::NEG_INFINITY,
        _ => value.parse().unwrap_or(f64::NAN),
    }
}

/// Significant total digits and fraction digits of a decimal
fn decimal_digits(value: &str) -> (usize, usize) {
    let unsigned = strip_sign(value);
    let (int, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let int = int.trim_start_matches('0');
    let frac = frac.trim_end_matches('0');
    (int.len() + frac.len(), frac.len())
}

fn is_duration(value: &str) -> bool {
    let body = value.strip_prefix('-').unwrap_or(value);
    let Some(body) = body.strip_prefix('P') else {
        return false;
    };
    let (date, time) = match body.split_once('T') {
        Some((date, time)) if !time.is_empty() => (date, Some(time)),
        Some(_) => return false,
        None => (body, None),
    };
    if date.is_empty() && time.is_none() {
        return false;
    }
    duration_fields(date, &['Y', 'M', 'D'], false)
        && time.is_none_or(|time| duration_fields(time, &['H', 'M', 'S'], true))
}

/// `nY nM nD` style fields in order, each at most once
fn duration_fields(mut text: &str, designators: &[char], fractional_last: bool) -> bool {
    let mut allowed = designators.iter().peekable();
    while !text.is_empty() {
        let Some(end) = text.find(|c: char| c.is_ascii_alphabetic()) else {
            return false;
        };
        let (digits, rest) = text.split_at(end);
        let mut rest_chars = rest.chars();
        let Some(designator) = rest_chars.next() else {
            return false;
        };
        loop {
            match allowed.next() {
                Some(d) if *d == designator => break,
                Some(_) => continue,
                None => return false,
            }
        }
        let is_last = allowed.peek().is_none();
        let valid = if fractional_last && is_last {
            is_decimal(digits) && !digits.starts_with(['+', '-'])
        } else {
            all_digits(digits)
        };
        if !valid {
            return false;
        }
        text = rest_chars.as_str();
    }
    true
}

fn year(value: &str) -> Option<(i32, &str)> {
    let (negative, unsigned) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value),
    };
    let len = unsigned.bytes().take_while(u8::is_ascii_digit).count();
    let (digits, rest) = unsigned.split_at(len);
    if len < 4 || (len > 4 && digits.starts_with('0')) {
        return None;
    }
    let year: i32 = digits.parse().ok()?;
    if year == 0 {
        return None;
    }
    Some((if negative { -year } else { year }, rest))
}

fn two_digits(value: &str, min: u8, max: u8) -> Option<(u8, &str)> {
    let digits = value.get(..2)?;
    if !all_digits(digits) {
        return None;
    }
    let n: u8 = digits.parse().ok()?;
    (min..=max).contains(&n).then(|| (n, value.get(2..).unwrap_or_default()))
}

fn year_month(value: &str) -> Option<(i32, u8, &str)> {
    let (year, rest) = year(value)?;
    let (month, rest) = two_digits(rest.strip_prefix('-')?, 1, 12)?;
    Some((year, month, rest))
}

fn valid_day(year: i32, month: u8, day: u8) -> bool {
    let year = if (-9999..=9999).contains(&year) { year } else { 2000 };
    Month::try_from(month).is_ok_and(|month| day <= days_in_year_month(year, month))
}

/// `YYYY-MM-DD`, returning what follows
fn date_part(value: &str) -> Option<&str> {
    let (year, month, rest) = year_month(value)?;
    let (day, rest) = two_digits(rest.strip_prefix('-')?, 1, 31)?;
    valid_day(year, month, day).then_some(rest)
}

/// `hh:mm:ss[.fff]` followed by an optional timezone
fn time_part(value: &str) -> bool {
    let Some((hour, rest)) = two_digits(value, 0, 24) else {
        return false;
    };
    let Some((minute, rest)) = rest.strip_prefix(':').and_then(|r| two_digits(r, 0, 59)) else {
        return false;
    };
    let Some((second, mut rest)) = rest.strip_prefix(':').and_then(|r| two_digits(r, 0, 59))
    else {
        return false;
    };
    let mut fraction_zero = true;
    if let Some(frac) = rest.strip_prefix('.') {
        let len = frac.bytes().take_while(u8::is_ascii_digit).count();
        if len == 0 {
            return false;
        }
        fraction_zero = frac.bytes().take(len).all(|b| b == b'0');
        rest = frac.get(len..).unwrap_or_default();
    }
    if hour == 24 && (minute != 0 || second != 0 || !fraction_zero) {
        return false;
    }
    timezone(rest)
}

fn timezone(value: &str) -> bool {
    if value.is_empty() || value == "Z" {
        return true;
    }
    let Some(offset) = value.strip_prefix(['+', '-']) else {
        return false;
    };
    match two_digits(offset, 0, 14) {
        Some((hours, rest)) => rest
            .strip_prefix(':')
            .and_then(|r| two_digits(r, 0, 59))
            .is_some_and(|(minutes, rest)| rest.is_empty() && (hours < 14 || minutes == 0)),
        None => false,
    }
}

fn is_base64(value: &str) -> bool {
    let chars: Vec<u8> = value.bytes().filter(|b| *b != b' ').collect();
    if chars.len() % 4 != 0 {
        return false;
    }
    let padding = chars.iter().rev().take_while(|b| **b == b'=').count();
    padding <= 2
        && chars
            .iter()
            .take(chars.len() - padding)
            .all(|b| b.is_ascii_alphanumeric() || *b == b'+' || *b == b'/')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(name: &str, value: &str) -> bool {
        Builtin::from_name(name)
            .map(SimpleType::builtin)
            .is_some_and(|ty| ty.validate(value).is_ok())
    }

    #[test]
    fn test_numeric_types() {
        assert!(check("integer", " 42 "));
        assert!(check("integer", "-0"));
        assert!(!check("integer", "4.2"));
        assert!(check("decimal", "-.5"));
        assert!(!check("decimal", "."));
        assert!(check("double", "1.5E-3"));
        assert!(check("float", "INF"));
        assert!(!check("float", "1e"));
        assert!(check("byte", "-128"));
        assert!(!check("byte", "128"));
        assert!(check("unsignedInt", "4294967295"));
        assert!(!check("unsignedInt", "-1"));
        assert!(check("positiveInteger", "99999999999999999999999"));
        assert!(!check("positiveInteger", "0"));
        assert!(check("nonPositiveInteger", "-3"));
    }

    #[test]
    fn test_string_types() {
        assert!(check("string", " a  b "));
        assert!(check("token", " a  b "));
        assert!(check("NCName", "item-1"));
        assert!(!check("NCName", "p:item"));
        assert!(!check("NCName", "1item"));
        assert!(check("QName", "p:item"));
        assert!(check("language", "en-US"));
        assert!(!check("language", "toolongprimary-x"));
        assert!(check("NMTOKENS", "a b  c"));
        assert!(!check("NMTOKENS", "   "));
        assert!(check("boolean", "1"));
        assert!(!check("boolean", "yes"));
    }

    #[test]
    fn test_temporal_types() {
        assert!(check("date", "2024-02-29"));
        assert!(!check("date", "2023-02-29"));
        assert!(check("date", "2024-01-31Z"));
        assert!(!check("dateTime", "2024-01-31T23:59:60.5+01:00"));
        assert!(check("dateTime", "2024-01-31T23:59:59.5+01:00"));
        assert!(check("time", "24:00:00"));
        assert!(!check("time", "24:00:01"));
        assert!(check("gYearMonth", "2024-12"));
        assert!(check("gMonthDay", "--02-29"));
        assert!(!check("gMonthDay", "--04-31"));
        assert!(check("duration", "P1Y2M3DT4H5M6.7S"));
        assert!(check("duration", "-PT5M"));
        assert!(!check("duration", "P"));
        assert!(!check("duration", "P1DT"));
        assert!(!check("duration", "P1M1Y"));
    }

    #[test]
    fn test_binary_types() {
        assert!(check("hexBinary", "0fA9"));
        assert!(!check("hexBinary", "0fA"));
        assert!(check("base64Binary", "aGVsbG8="));
        assert!(!check("base64Binary", "aGVsbG8"));
    }

    #[test]
    fn test_facets() -> Result<(), String> {
        let ty = SimpleType::builtin(Builtin::Integer).restrict(vec![
            Facet::parse("minInclusive", "1")?,
            Facet::parse("maxExclusive", "10")?,
        ]);
        assert!(ty.validate("9").is_ok());
        assert_eq!(
            ty.validate("10").err().as_deref(),
            Some("[facet 'maxExclusive'] The value '10' must be less than '10'.")
        );
        assert_eq!(
            ty.validate("0").err().as_deref(),
            Some("[facet 'minInclusive'] The value '0' is less than the minimum value allowed ('1').")
        );

        let code = SimpleType::builtin(Builtin::String).restrict(Facet::merge(vec![
            Facet::parse("pattern", "[A-Z]{2}\\d")?,
            Facet::parse("pattern", "\\i\\c*")?,
            Facet::parse("maxLength", "4")?,
        ]));
        assert!(code.validate("AB1").is_ok());
        assert!(code.validate("_x-y").is_ok());
        assert!(code.validate("1AB").is_err());
        assert_eq!(
            code.validate("abcde").err().as_deref(),
            Some("[facet 'maxLength'] The value has a length of '5'; this exceeds the allowed maximum length of '4'.")
        );
        Ok(())
    }

    #[test]
    fn test_enumeration_uses_value_space() -> Result<(), String> {
        let ty = SimpleType::builtin(Builtin::Decimal).restrict(Facet::merge(vec![
            Facet::parse("enumeration", "1.0")?,
            Facet::parse("enumeration", "2.5")?,
        ]));
        assert!(ty.validate("1").is_ok());
        assert_eq!(
            ty.validate("3").err().as_deref(),
            Some("[facet 'enumeration'] The value '3' is not an element of the set {'1.0', '2.5'}.")
        );
        Ok(())
    }

    #[test]
    fn test_digits_facets() -> Result<(), String> {
        let ty = SimpleType::builtin(Builtin::Decimal).restrict(vec![
            Facet::parse("totalDigits", "4")?,
            Facet::parse("fractionDigits", "2")?,
        ]);
        assert!(ty.validate("12.30").is_ok());
        assert!(ty.validate("123.45").is_err());
        assert!(ty.validate("1.234").is_err());
        Ok(())
    }

    #[test]
    fn test_list_and_union() {
        let list = SimpleType::List {
            item: Box::new(SimpleType::builtin(Builtin::Integer)),
            facets: vec![Facet::MaxLength(2)],
        };
        assert!(list.validate("1  2").is_ok());
        assert!(list.validate("1 x").is_err());
        assert!(list.validate("1 2 3").is_err());

        let union = SimpleType::Union(vec![
            SimpleType::builtin(Builtin::Integer),
            SimpleType::builtin(Builtin::Boolean),
        ]);
        assert!(union.validate("true").is_ok());
        assert!(union.validate("7").is_ok());
        assert!(union.validate("maybe").is_err());
    }
}
