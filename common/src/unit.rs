//! Marker types.

/// Marker type describing an entity creation.
#[derive(Clone, Copy, Debug)]
pub struct Creation;

/// Marker type describing an entity approval.
#[derive(Clone, Copy, Debug)]
pub struct Approval;

/// Marker type describing an entity rejection.
#[derive(Clone, Copy, Debug)]
pub struct Rejection;

/// Marker type describing a purchase.
#[derive(Clone, Copy, Debug)]
pub struct Purchase;

/// Marker type describing a payment settlement.
#[derive(Clone, Copy, Debug)]
pub struct Settlement;

/// Marker type describing an entity expiration.
#[derive(Clone, Copy, Debug)]
pub struct Expiration;

/// Marker type describing an entity validity bound.
#[derive(Clone, Copy, Debug)]
pub struct Validity;
