//! Unit-converting proxies.
//!
//! A unit proxy re-exposes another attribute in a different unit, e.g. a
//! speed stored in feet shown in grid squares. Reads convert from the
//! source; writes convert back and land on the source, whose update then
//! reaches the proxy like any other dependent.

use crate::error::AttrError;
use crate::name::AttrName;
use crate::node::{AttrKind, Link, Node, NodeId, ProxyState};
use crate::numeric::StatValue;
use crate::sheet::Sheet;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Linear unit conversion: `proxy = source * scale + shift`.
///
/// # Examples
///
/// ```rust
/// use statsheet::UnitConversion;
///
/// let temp = UnitConversion::celsius_to_fahrenheit();
/// assert!((temp.from_source(100.0) - 212.0).abs() < 1e-9);
/// assert!((temp.to_source(32.0) - 0.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitConversion {
    scale: StatValue,
    shift: StatValue,
}

impl UnitConversion {
    /// Create a linear conversion.
    ///
    /// # Errors
    ///
    /// `InvalidValue` when `scale` is zero or either parameter is not
    /// finite; such a conversion could not be written through.
    pub fn linear(scale: StatValue, shift: StatValue) -> Result<Self, AttrError> {
        if !scale.is_finite() || !shift.is_finite() {
            return Err(AttrError::InvalidValue(
                "unit conversion parameters must be finite".to_string(),
            ));
        }
        if scale == 0.0 {
            return Err(AttrError::InvalidValue(
                "unit conversion scale must be non-zero".to_string(),
            ));
        }
        Ok(Self { scale, shift })
    }

    /// Same unit on both sides.
    pub fn identity() -> Self {
        Self {
            scale: 1.0,
            shift: 0.0,
        }
    }

    /// Degrees Celsius in the source, Fahrenheit through the proxy.
    pub fn celsius_to_fahrenheit() -> Self {
        Self {
            scale: 1.8,
            shift: 32.0,
        }
    }

    /// Feet in the source, 5-foot grid squares through the proxy.
    pub fn feet_to_squares() -> Self {
        Self {
            scale: 0.2,
            shift: 0.0,
        }
    }

    /// Copper pieces in the source, gold pieces through the proxy.
    pub fn copper_to_gold() -> Self {
        Self {
            scale: 0.01,
            shift: 0.0,
        }
    }

    pub fn scale(&self) -> StatValue {
        self.scale
    }

    pub fn shift(&self) -> StatValue {
        self.shift
    }

    /// Convert a source value into proxy units.
    pub fn from_source(&self, source: StatValue) -> StatValue {
        source * self.scale + self.shift
    }

    /// Convert a proxy value back into source units.
    pub fn to_source(&self, value: StatValue) -> StatValue {
        (value - self.shift) / self.scale
    }
}

impl Default for UnitConversion {
    fn default() -> Self {
        Self::identity()
    }
}

impl Sheet {
    /// Create a unit proxy over `source`.
    ///
    /// Without a source, the proxy creates and owns a zero-valued scalar
    /// named `"<name> source"`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use statsheet::{Sheet, UnitConversion};
    ///
    /// let mut sheet = Sheet::new();
    /// let speed_ft = sheet.create_scalar("Speed", 30.0);
    /// let squares = sheet
    ///     .create_unit_proxy("Speed (squares)", Some(speed_ft), UnitConversion::feet_to_squares())
    ///     .unwrap();
    ///
    /// assert!((sheet.value(squares).unwrap() - 6.0).abs() < 1e-9);
    ///
    /// sheet.set_value(squares, 5.0).unwrap();
    /// assert!((sheet.value(speed_ft).unwrap() - 25.0).abs() < 1e-9);
    /// ```
    pub fn create_unit_proxy(
        &mut self,
        name: impl Into<AttrName>,
        source: Option<NodeId>,
        conversion: UnitConversion,
    ) -> Result<NodeId, AttrError> {
        let name = name.into();
        let source = match source {
            Some(id) => {
                self.node(id)?;
                Link::borrowed(id)
            }
            None => Link::owned(self.create_scalar(name.suffixed("source"), 0.0)),
        };
        let proxy = self.insert(Node::new(
            name,
            AttrKind::UnitProxy(ProxyState { source, conversion }),
        ));
        self.link(proxy, source.id)?;
        self.refresh(proxy);
        Ok(proxy)
    }

    /// The attribute a proxy reads from.
    pub fn source_node(&self, proxy: NodeId) -> Result<NodeId, AttrError> {
        Ok(self.proxy_state(proxy)?.source.id)
    }

    /// The conversion a proxy applies.
    pub fn conversion(&self, proxy: NodeId) -> Result<UnitConversion, AttrError> {
        Ok(self.proxy_state(proxy)?.conversion)
    }

    /// Replace the conversion and recompute the proxy.
    pub fn set_conversion(&mut self, proxy: NodeId, conversion: UnitConversion) -> Result<(), AttrError> {
        self.proxy_state_mut(proxy)?.conversion = conversion;
        self.update(proxy)
    }

    /// Re-point a proxy at another source.
    ///
    /// The old source is detached first and destroyed if the proxy owned
    /// it. If attaching would close a cycle, or an owned old source is
    /// still built into another attribute, nothing changes.
    pub fn set_source(&mut self, proxy: NodeId, new_source: NodeId) -> Result<(), AttrError> {
        let old = self.proxy_state(proxy)?.source;
        self.node(new_source)?;
        if old.id == new_source {
            return Ok(());
        }
        if old.owned {
            self.check_removable(old.id, proxy)?;
        }
        self.link(proxy, new_source)?;
        self.graph.unlink(proxy, old.id);
        self.proxy_state_mut(proxy)?.source = Link::borrowed(new_source);
        debug!(proxy = %self.graph_name(proxy), source = %self.graph_name(new_source), "proxy source replaced");
        if old.owned {
            self.remove(old.id)?;
        }
        self.update(proxy)
    }

    fn proxy_state(&self, id: NodeId) -> Result<&ProxyState, AttrError> {
        self.state(id, "a unit proxy", AttrKind::as_proxy)
    }

    fn proxy_state_mut(&mut self, id: NodeId) -> Result<&mut ProxyState, AttrError> {
        self.state_mut(id, "a unit proxy", AttrKind::as_proxy_mut)
    }
}
