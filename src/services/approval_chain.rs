//! Derives the ordered approver chain for a new booking.
//!
//! The chain mirrors a two-tier sign-off: line manager first, then senior
//! management, with role-based fallbacks when the org chart is shallow.
//! This is deliberate policy, not a generic graph walk; the precedence
//! order below is load-bearing.

use anyhow::Result;
use std::sync::Arc;

use crate::domain::Role;
use crate::services::directory::Directory;

/// One approver assignment in a booking's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainAssignment {
    pub approver_id: i32,
    pub level: i32,
}

pub struct ApprovalChainBuilder {
    directory: Arc<dyn Directory>,
}

impl ApprovalChainBuilder {
    #[must_use]
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self { directory }
    }

    /// Builds the ordered chain for a requester. Deterministic for a
    /// fixed directory snapshot. May return an empty chain when no
    /// eligible approver exists; the caller auto-approves in that case
    /// and must surface it as a diagnostic.
    ///
    /// Level 1 is the requester's supervisor, or the first Administrator
    /// when there is none. Level 2 is the supervisor's supervisor, then
    /// an Administrator distinct from level 1, or (when level 1 was
    /// already the Administrator fallback) an Approver distinct from
    /// level 1. A level with no candidate is omitted.
    pub async fn build(&self, requester_id: i32) -> Result<Vec<ChainAssignment>> {
        let requester = self
            .directory
            .get_user(requester_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Requester {requester_id} not in directory"))?;

        let mut chain = Vec::with_capacity(2);

        if let Some(supervisor_id) = requester.supervisor_id {
            chain.push(ChainAssignment {
                approver_id: supervisor_id,
                level: 1,
            });

            // A dangling supervisor link degrades to the admin fallback
            // rather than failing booking creation.
            let supervisor = self.directory.get_user(supervisor_id).await?;

            if let Some(next_up) = supervisor.and_then(|s| s.supervisor_id) {
                chain.push(ChainAssignment {
                    approver_id: next_up,
                    level: 2,
                });
            } else if let Some(admin) = self
                .directory
                .find_first_by_role(Role::Administrator, None)
                .await?
                && admin.id != supervisor_id
            {
                chain.push(ChainAssignment {
                    approver_id: admin.id,
                    level: 2,
                });
            }
        } else {
            let admin = self
                .directory
                .find_first_by_role(Role::Administrator, None)
                .await?;

            if let Some(admin) = admin {
                chain.push(ChainAssignment {
                    approver_id: admin.id,
                    level: 1,
                });
            }

            if let Some(approver) = self
                .directory
                .find_first_by_role(Role::Approver, admin.map(|a| a.id))
                .await?
            {
                chain.push(ChainAssignment {
                    approver_id: approver.id,
                    level: 2,
                });
            }
        }

        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::directory::DirectoryUser;
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    /// Fixed directory snapshot backed by a sorted map, so the
    /// lowest-id tie-break matches the SQL `ORDER BY id` behaviour.
    struct FixedDirectory {
        users: BTreeMap<i32, DirectoryUser>,
    }

    impl FixedDirectory {
        fn new(users: &[(i32, Role, Option<i32>)]) -> Self {
            Self {
                users: users
                    .iter()
                    .map(|&(id, role, supervisor_id)| {
                        (
                            id,
                            DirectoryUser {
                                id,
                                role,
                                supervisor_id,
                            },
                        )
                    })
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl Directory for FixedDirectory {
        async fn get_user(&self, id: i32) -> Result<Option<DirectoryUser>> {
            Ok(self.users.get(&id).copied())
        }

        async fn find_first_by_role(
            &self,
            role: Role,
            exclude: Option<i32>,
        ) -> Result<Option<DirectoryUser>> {
            Ok(self
                .users
                .values()
                .find(|u| u.role == role && Some(u.id) != exclude)
                .copied())
        }
    }

    fn builder(users: &[(i32, Role, Option<i32>)]) -> ApprovalChainBuilder {
        ApprovalChainBuilder::new(Arc::new(FixedDirectory::new(users)))
    }

    fn assignments(chain: &[ChainAssignment]) -> Vec<(i32, i32)> {
        chain.iter().map(|a| (a.approver_id, a.level)).collect()
    }

    #[tokio::test]
    async fn supervisor_and_their_supervisor() {
        // requester 10 -> supervisor 20 -> supervisor 30
        let builder = builder(&[
            (10, Role::User, Some(20)),
            (20, Role::Approver, Some(30)),
            (30, Role::Approver, None),
        ]);

        let chain = builder.build(10).await.unwrap();
        assert_eq!(assignments(&chain), vec![(20, 1), (30, 2)]);
    }

    #[tokio::test]
    async fn supervisor_without_one_falls_back_to_admin() {
        let builder = builder(&[
            (1, Role::Administrator, None),
            (10, Role::User, Some(20)),
            (20, Role::Approver, None),
        ]);

        let chain = builder.build(10).await.unwrap();
        assert_eq!(assignments(&chain), vec![(20, 1), (1, 2)]);
    }

    #[tokio::test]
    async fn admin_supervisor_is_not_assigned_twice() {
        // supervisor is also the only Administrator: level 2 is omitted
        let builder = builder(&[
            (5, Role::Administrator, None),
            (10, Role::User, Some(5)),
        ]);

        let chain = builder.build(10).await.unwrap();
        assert_eq!(assignments(&chain), vec![(5, 1)]);
    }

    #[tokio::test]
    async fn no_supervisor_uses_admin_then_approver() {
        let builder = builder(&[
            (1, Role::Administrator, None),
            (2, Role::Approver, None),
            (10, Role::User, None),
        ]);

        let chain = builder.build(10).await.unwrap();
        assert_eq!(assignments(&chain), vec![(1, 1), (2, 2)]);
    }

    #[tokio::test]
    async fn lowest_id_admin_wins_tie_break() {
        let builder = builder(&[
            (3, Role::Administrator, None),
            (7, Role::Administrator, None),
            (10, Role::User, None),
        ]);

        let chain = builder.build(10).await.unwrap();
        assert_eq!(chain[0].approver_id, 3);
    }

    #[tokio::test]
    async fn empty_directory_yields_degenerate_chain() {
        let builder = builder(&[(10, Role::User, None)]);

        let chain = builder.build(10).await.unwrap();
        assert!(chain.is_empty());
    }

    #[tokio::test]
    async fn chain_is_deterministic() {
        let users = [
            (1, Role::Administrator, None),
            (2, Role::Approver, None),
            (10, Role::User, Some(2)),
        ];
        let builder = builder(&users);

        let first = builder.build(10).await.unwrap();
        for _ in 0..5 {
            assert_eq!(builder.build(10).await.unwrap(), first);
        }
    }

    #[tokio::test]
    async fn unknown_requester_is_an_error() {
        let builder = builder(&[(1, Role::Administrator, None)]);
        assert!(builder.build(99).await.is_err());
    }
}
