//! Logical key names shared by every admission component.

/// Credential on record for a user.
#[must_use]
pub fn credential(user_id: &str) -> String {
    format!("xtoken_{user_id}")
}

/// JSON subscription record for a user.
#[must_use]
pub fn subscription(user_id: &str) -> String {
    format!("user:{user_id}:active_packages")
}

/// JSON record describing a resource and its label.
#[must_use]
pub fn resource(resource_id: &str) -> String {
    format!("car_status:{resource_id}")
}

/// Fixed-window quota counter for one `(user, tier, model)` triple.
#[must_use]
pub fn quota_counter(user_id: &str, tier: &str, model: &str) -> String {
    format!("star_rate_limit:{user_id}:{tier}:{model}")
}

/// Tier the user's live quota counter was last armed for.
#[must_use]
pub fn tier_marker(user_id: &str) -> String {
    format!("star_rate_limit_package:{user_id}")
}
