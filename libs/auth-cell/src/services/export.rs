use crate::models::{ProfileExport, SessionUser};
use shared_models::Timestamp;

/// Profile download for the signed-in operator.
pub fn export_profile(user: &SessionUser) -> ProfileExport {
    let exported_at = Timestamp::now();
    ProfileExport {
        file_name: format!(
            "profile-{}-{}.json",
            user.id,
            exported_at.local().format("%Y%m%d")
        ),
        exported_at,
        profile: user.clone(),
    }
}
