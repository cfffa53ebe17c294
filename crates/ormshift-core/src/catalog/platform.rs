//! Built-in schema for the education platform data model.

use super::{EntityDef, SchemaBundle};

/// Version of the built-in platform schema.
pub const PLATFORM_SCHEMA_VERSION: u64 = 1;

/// The platform's entities in foreign-key order.
///
/// Source tables use the PascalCase model names with camelCase columns;
/// destination tables are plural snake_case with snake_case columns.
pub fn platform_schema() -> SchemaBundle {
    SchemaBundle::new(PLATFORM_SCHEMA_VERSION)
        .with_entity(EntityDef::new("users", "User", "users", "id"))
        .with_entity(EntityDef::new("institutions", "Institution", "institutions", "id"))
        .with_entity(
            EntityDef::new("profiles", "Profile", "profiles", "id")
                .with_child("student_profiles", "profileId")
                .with_child("mentor_profiles", "profileId")
                .with_child("institution_profiles", "profileId"),
        )
        .with_entity(EntityDef::new(
            "student_profiles",
            "StudentProfile",
            "student_profiles",
            "id",
        ))
        .with_entity(EntityDef::new(
            "mentor_profiles",
            "MentorProfile",
            "mentor_profiles",
            "id",
        ))
        .with_entity(EntityDef::new(
            "institution_profiles",
            "InstitutionProfile",
            "institution_profiles",
            "id",
        ))
        .with_entity(
            EntityDef::new("posts", "Post", "posts", "id")
                .with_column("authorId", "author_profile_id")
                .with_child("post_comments", "postId")
                .with_child("post_likes", "postId"),
        )
        .with_entity(
            EntityDef::new("post_comments", "Comment", "post_comments", "id")
                .with_column("authorId", "author_profile_id"),
        )
        .with_entity(
            EntityDef::new("post_likes", "Like", "post_likes", "id")
                .with_column("authorId", "author_profile_id"),
        )
        .with_entity(
            EntityDef::new("connections", "Connection", "connections", "id")
                .with_column("requesterId", "requester_profile_id")
                .with_column("addresseeId", "addressee_profile_id"),
        )
        .with_entity(
            EntityDef::new("circles", "Circle", "circles", "id")
                .with_column("ownerId", "owner_profile_id")
                .with_child("circle_members", "circleId"),
        )
        .with_entity(
            EntityDef::new("circle_members", "CircleMember", "circle_members", "id")
                .with_column("memberId", "member_profile_id"),
        )
        .with_entity(
            EntityDef::new(
                "academic_communities",
                "AcademicCommunity",
                "academic_communities",
                "id",
            )
            .with_child("community_members", "communityId"),
        )
        .with_entity(
            EntityDef::new("community_members", "CommunityMember", "community_members", "id")
                .with_column("memberId", "member_profile_id"),
        )
        .with_entity(EntityDef::new(
            "onboarding_progress",
            "OnboardingProgress",
            "onboarding_progress",
            "id",
        ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_schema_is_valid() {
        let schema = platform_schema();
        schema.validate().unwrap();
        assert_eq!(schema.version, PLATFORM_SCHEMA_VERSION);
    }

    #[test]
    fn test_platform_top_level_order() {
        let schema = platform_schema();
        let order: Vec<_> = schema.migration_order().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            order,
            vec![
                "users",
                "institutions",
                "profiles",
                "posts",
                "connections",
                "circles",
                "academic_communities",
                "onboarding_progress",
            ]
        );
    }
}
