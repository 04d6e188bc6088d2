//! `login` and `users`.

use super::Service;
use crate::error::{ServiceError, ServiceResult};
use crate::state::{Node, unix_now};
use crate::sync::replication;
use board_proto::{Reply, Request, status};
use std::sync::Arc;
use tracing::info;

/// Register a user name. Duplicates are rejected.
pub async fn login(node: &Arc<Node>, request: &Request) -> ServiceResult {
    let data = request.data();
    let user = data.user.clone().ok_or(ServiceError::MissingField("user"))?;

    node.store().add_user(&user, data.timestamp).await?;
    info!(%user, "User registered");
    replication::replicate(node, Service::Login, data);

    Ok(Reply::new(Service::Login.as_str(), node.clock().tick(), unix_now())
        .with_status(status::SUCCESS))
}

/// List registered user names.
pub fn users(node: &Node) -> Reply {
    let users = node.store().user_names();
    Reply::new(Service::Users.as_str(), node.clock().tick(), unix_now()).with_users(users)
}
