//! On-load operations
//!
//! An operation is `(order, kind, amount)`. The amount is either a target
//! resolution or a CSS-style pixel box, never both.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{BuildError, Result};
use crate::manifest::{AmountSpec, OperationSpec, OrderedMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Crop,
    Scale,
    Tile,
    Rotate,
    Translate,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Crop => "crop",
            OperationKind::Scale => "scale",
            OperationKind::Tile => "tile",
            OperationKind::Rotate => "rotate",
            OperationKind::Translate => "translate",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "crop" => Ok(OperationKind::Crop),
            "scale" => Ok(OperationKind::Scale),
            "tile" => Ok(OperationKind::Tile),
            "rotate" => Ok(OperationKind::Rotate),
            "translate" => Ok(OperationKind::Translate),
            _ => Err(()),
        }
    }
}

/// Target resolution. `None` on an axis means "keep the current size".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EffectResolution {
    pub x: Option<u32>,
    pub y: Option<u32>,
}

impl EffectResolution {
    /// Fill unset axes from `current`.
    pub fn or_size(&self, current: (u32, u32)) -> (u32, u32) {
        (self.x.unwrap_or(current.0), self.y.unwrap_or(current.1))
    }
}

impl FromStr for EffectResolution {
    type Err = String;

    /// `"W"` is square; `"WxH"` may leave either side empty.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty resolution".to_string());
        }
        match s.split_once('x') {
            None => {
                let side = parse_axis(s)?;
                Ok(Self { x: Some(side), y: Some(side) })
            }
            Some((x, y)) => Ok(Self {
                x: optional_axis(x)?,
                y: optional_axis(y)?,
            }),
        }
    }
}

fn optional_axis(s: &str) -> std::result::Result<Option<u32>, String> {
    let s = s.trim();
    if s.is_empty() {
        Ok(None)
    } else {
        parse_axis(s).map(Some)
    }
}

fn parse_axis(s: &str) -> std::result::Result<u32, String> {
    match s.trim().parse::<u32>() {
        Ok(0) => Err(format!("resolution axis must be positive, got '{}'", s)),
        Ok(v) => Ok(v),
        Err(_) => Err(format!("invalid resolution axis '{}'", s)),
    }
}

/// `(left, top, right, bottom)`. Depending on the operation the last two
/// components are either coordinates or multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PixelBox {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl PixelBox {
    pub fn new(left: i64, top: i64, right: i64, bottom: i64) -> Self {
        Self { left, top, right, bottom }
    }

    pub fn from_values(values: &[i64]) -> std::result::Result<Self, String> {
        match *values {
            [all] => Ok(Self::new(all, all, all, all)),
            [w, h] => Ok(Self::new(0, 0, w, h)),
            [top, right, bottom] => Ok(Self::new(0, top, right, bottom)),
            [left, top, right, bottom] => Ok(Self::new(left, top, right, bottom)),
            _ => Err(format!("pixel box takes 1 to 4 values, got {}", values.len())),
        }
    }

    pub fn as_tuple(&self) -> (i64, i64, i64, i64) {
        (self.left, self.top, self.right, self.bottom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Amount {
    Resolution(EffectResolution),
    PixelBox(PixelBox),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Operation {
    pub order: i64,
    pub kind: OperationKind,
    pub amount: Amount,
}

impl Operation {
    pub fn from_spec(asset: &str, name: &str, spec: &OperationSpec) -> Result<Self> {
        let kind: OperationKind = name.parse().map_err(|_| BuildError::UnrecognisedOperation {
            asset: asset.to_string(),
            operation: name.to_string(),
        })?;

        let amount = match &spec.amount {
            AmountSpec::UntilResolution(literal) => Amount::Resolution(
                literal
                    .as_text()
                    .parse()
                    .map_err(|reason| BuildError::malformed(asset, format!("{}: {}", name, reason)))?,
            ),
            AmountSpec::ByValue(values) => Amount::PixelBox(
                PixelBox::from_values(values)
                    .map_err(|reason| BuildError::malformed(asset, format!("{}: {}", name, reason)))?,
            ),
        };

        Ok(Self { order: spec.order, kind, amount })
    }
}

/// Stable: equal `order` keeps declaration order.
pub fn sort_operations(operations: &mut [Operation]) {
    operations.sort_by_key(|op| op.order);
}

/// Parse an `on_load` block into execution order.
pub fn parse_operations(asset: &str, specs: &OrderedMap<OperationSpec>) -> Result<Vec<Operation>> {
    let mut operations = specs
        .iter()
        .map(|(name, spec)| Operation::from_spec(asset, name, spec))
        .collect::<Result<Vec<_>>>()?;
    sort_operations(&mut operations);
    Ok(operations)
}
