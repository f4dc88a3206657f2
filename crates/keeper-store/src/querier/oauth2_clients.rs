//! OAuth2 client operations. Clients belong to users, not accounts.

use keeper_core::ids::{new_external_id, unix_now};
use keeper_core::{
    AuditLogEntry, FieldChangeSummary, OAuth2Client, OAuth2ClientCreationInput, OAuth2ClientList, QueryFilter,
    audit,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::row_mapper::{map_audit_log_entry, map_oauth2_client, scan_count, scan_list, scan_one};
use super::{Delivery, Querier, pagination, require, require_text};
use crate::errors::Result;

impl Querier {
    /// Fetch one OAuth2 client owned by `user_id`.
    pub async fn get_oauth2_client(
        &self,
        cancel: &CancellationToken,
        client_id: u64,
        user_id: u64,
    ) -> Result<OAuth2Client> {
        require(client_id, "oauth2_client_id")?;
        require(user_id, "user_id")?;
        debug!(client_id, user_id, "get_oauth2_client called");

        self.run(cancel, move |conn, b, _| {
            let query = b.build_get_oauth2_client_query(client_id, user_id);
            scan_one(conn, &query, map_oauth2_client, "oauth2 client")
        })
        .await
    }

    /// Fetch a live OAuth2 client by its public client ID.
    pub async fn get_oauth2_client_by_client_id(
        &self,
        cancel: &CancellationToken,
        client_id: &str,
    ) -> Result<OAuth2Client> {
        require_text(client_id, "client_id")?;
        debug!(client_id, "get_oauth2_client_by_client_id called");

        let client_id = client_id.to_owned();
        self.run(cancel, move |conn, b, _| {
            let query = b.build_get_oauth2_client_by_client_id_query(&client_id);
            scan_one(conn, &query, map_oauth2_client, "oauth2 client")
        })
        .await
    }

    /// Count every live OAuth2 client.
    pub async fn get_all_oauth2_clients_count(&self, cancel: &CancellationToken) -> Result<u64> {
        debug!("get_all_oauth2_clients_count called");
        self.run(cancel, |conn, b, _| scan_count(conn, &b.build_get_all_oauth2_clients_count_query()))
            .await
    }

    /// Stream every live OAuth2 client in batches.
    pub async fn get_all_oauth2_clients(
        &self,
        cancel: &CancellationToken,
        delivery: Delivery<OAuth2Client>,
    ) -> Result<()> {
        let count = self.get_all_oauth2_clients_count(cancel).await?;
        debug!(count, "get_all_oauth2_clients called");
        self.stream(
            cancel,
            count,
            delivery,
            |b, begin, end| b.build_get_batch_of_oauth2_clients_query(begin, end),
            map_oauth2_client,
        )
    }

    /// One page of a user's OAuth2 clients.
    pub async fn get_oauth2_clients(
        &self,
        cancel: &CancellationToken,
        user_id: u64,
        filter: Option<&QueryFilter>,
    ) -> Result<OAuth2ClientList> {
        require(user_id, "user_id")?;
        debug!(user_id, "get_oauth2_clients called");

        let owned = filter.cloned();
        let scanned = self
            .run(cancel, move |conn, b, _| {
                let query = b.build_get_oauth2_clients_query(user_id, owned.as_ref());
                scan_list(conn, &query, map_oauth2_client, true)
            })
            .await?;
        Ok(OAuth2ClientList {
            pagination: pagination(filter, scanned.filtered_count, scanned.total_count),
            clients: scanned.entities,
        })
    }

    /// Create an OAuth2 client. The owning user is recorded as the actor.
    pub async fn create_oauth2_client(
        &self,
        cancel: &CancellationToken,
        input: &OAuth2ClientCreationInput,
    ) -> Result<OAuth2Client> {
        require(input.belongs_to_user, "belongs_to_user")?;
        require_text(&input.name, "client name")?;
        require_text(&input.client_id, "client_id")?;
        require_text(&input.client_secret, "client_secret")?;
        debug!(user_id = input.belongs_to_user, "create_oauth2_client called");

        let mut client = OAuth2Client {
            id: 0,
            external_id: new_external_id(),
            name: input.name.clone(),
            client_id: input.client_id.clone(),
            client_secret: input.client_secret.clone(),
            redirect_uri: input.redirect_uri.clone(),
            scopes: input.scopes.clone(),
            created_on: unix_now(),
            last_updated_on: None,
            archived_on: None,
            belongs_to_user: input.belongs_to_user,
        };
        self.run(cancel, move |conn, b, exec| {
            let query = b.build_create_oauth2_client_query(&client);
            let id = exec.perform_write_then_audit(conn, "creating oauth2 client", &query, false, |id| {
                client.id = id;
                Some(audit::build_oauth2_client_creation_event_entry(&client))
            })?;
            client.id = id;
            Ok(client)
        })
        .await
    }

    /// Persist an updated OAuth2 client and record `changes`.
    pub async fn update_oauth2_client(
        &self,
        cancel: &CancellationToken,
        client: &OAuth2Client,
        changes: &[FieldChangeSummary],
    ) -> Result<()> {
        require(client.id, "oauth2_client_id")?;
        require(client.belongs_to_user, "belongs_to_user")?;
        debug!(client_id = client.id, user_id = client.belongs_to_user, "update_oauth2_client called");

        let client = client.clone();
        let changes = changes.to_vec();
        self.run(cancel, move |conn, b, exec| {
            let query = b.build_update_oauth2_client_query(&client);
            exec.perform_write_then_audit(conn, "updating oauth2 client", &query, true, |_| {
                Some(audit::build_oauth2_client_update_event_entry(client.belongs_to_user, client.id, &changes))
            })
            .map(drop)
        })
        .await
    }

    /// Archive an OAuth2 client owned by `user_id`.
    pub async fn archive_oauth2_client(&self, cancel: &CancellationToken, client_id: u64, user_id: u64) -> Result<()> {
        require(client_id, "oauth2_client_id")?;
        require(user_id, "user_id")?;
        debug!(client_id, user_id, "archive_oauth2_client called");

        self.run(cancel, move |conn, b, exec| {
            let query = b.build_archive_oauth2_client_query(client_id, user_id);
            exec.perform_write_then_audit(conn, "archiving oauth2 client", &query, true, |_| {
                Some(audit::build_oauth2_client_archive_event_entry(user_id, client_id))
            })
            .map(drop)
        })
        .await
    }

    /// Audit history of an OAuth2 client.
    pub async fn get_audit_log_entries_for_oauth2_client(
        &self,
        cancel: &CancellationToken,
        client_id: u64,
    ) -> Result<Vec<AuditLogEntry>> {
        require(client_id, "oauth2_client_id")?;
        debug!(client_id, "get_audit_log_entries_for_oauth2_client called");

        self.run(cancel, move |conn, b, _| {
            let query = b.build_get_audit_log_entries_for_oauth2_client_query(client_id);
            Ok(scan_list(conn, &query, map_audit_log_entry, false)?.entities)
        })
        .await
    }
}
