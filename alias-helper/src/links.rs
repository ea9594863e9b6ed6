// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Access to the kernel link table.

use async_trait::async_trait;
use futures::TryStreamExt;
use rtnetlink::packet_route::link::{LinkAttribute, LinkMessage};
use rtnetlink::{Handle, LinkUnspec, new_connection};
use tracing::debug;

use crate::error::AliasError;

/// A kernel network device, as far as aliasing is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub index: u32,
    pub name: String,
    pub alias: Option<String>,
}

impl From<LinkMessage> for Link {
    fn from(message: LinkMessage) -> Self {
        let mut link = Link {
            index: message.header.index,
            name: String::new(),
            alias: None,
        };
        for attribute in message.attributes {
            match attribute {
                LinkAttribute::IfName(name) => link.name = name,
                LinkAttribute::IfAlias(alias) => link.alias = Some(alias),
                _ => {}
            }
        }
        link
    }
}

#[async_trait]
pub trait LinkTable: Send + Sync {
    async fn links(&self) -> Result<Vec<Link>, AliasError>;
    async fn set_alias(&self, index: u32, alias: &str) -> Result<(), AliasError>;
}

/// The link table of the current network namespace, over rtnetlink.
pub struct NetlinkLinkTable {
    handle: Handle,
}

impl NetlinkLinkTable {
    /// Open a netlink connection. Must be called from within a tokio runtime.
    pub fn new() -> Result<Self, AliasError> {
        let (connection, handle, _) = new_connection()?;
        tokio::spawn(connection);
        debug!("Netlink connection established");
        Ok(Self { handle })
    }
}

#[async_trait]
impl LinkTable for NetlinkLinkTable {
    async fn links(&self) -> Result<Vec<Link>, AliasError> {
        let messages: Vec<LinkMessage> = self.handle.link().get().execute().try_collect().await?;
        Ok(messages.into_iter().map(Link::from).collect())
    }

    async fn set_alias(&self, index: u32, alias: &str) -> Result<(), AliasError> {
        let mut message = LinkUnspec::new_with_index(index).build();
        message
            .attributes
            .push(LinkAttribute::IfAlias(alias.to_string()));
        self.handle
            .link()
            .set(message)
            .execute()
            .await
            .map_err(|e| AliasError::SetAlias {
                index,
                reason: e.to_string(),
            })
    }
}
