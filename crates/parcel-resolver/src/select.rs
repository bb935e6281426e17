use parcel_core::PackageRecord;
use semver::VersionReq;

pub fn select_highest_compatible<'a>(
    candidates: &'a [PackageRecord],
    requirement: &VersionReq,
) -> Option<&'a PackageRecord> {
    candidates
        .iter()
        .filter(|record| requirement.matches(&record.version))
        .max_by(|a, b| a.version.cmp(&b.version))
}
