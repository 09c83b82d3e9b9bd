//! Administration RPC catalog.
//!
//! Thin request builders over [`SessionClient::send_request`]. Each method
//! maps to one server call and unpacks the member of the result it cares
//! about.

use std::collections::HashMap;

use rand::Rng;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::ApiError;
use crate::models::{Condition, Domain, ListPage, Query, SortDirection, SortOrder, User};
use crate::session::SessionClient;

/// Server constant holding the ascending sort direction.
const ASC_CONSTANT: &str = "kerio_web_Asc";

/// Typed wrappers for the admin endpoint, borrowing an open session.
pub struct AdminApi<'a> {
    session: &'a mut SessionClient,
    constants: Option<HashMap<String, Value>>,
}

impl<'a> AdminApi<'a> {
    pub fn new(session: &'a mut SessionClient) -> Self {
        Self {
            session,
            constants: None,
        }
    }

    pub fn session(&mut self) -> &mut SessionClient {
        self.session
    }

    /// `Server.getNamedConstantList` as a name → value map, cached after
    /// the first call.
    pub async fn constants(&mut self) -> Result<&HashMap<String, Value>, ApiError> {
        if self.constants.is_none() {
            let result = self
                .session
                .send_request("Server.getNamedConstantList", None)
                .await?;
            let constants: HashMap<String, Value> = result
                .get("constants")
                .and_then(Value::as_array)
                .map(|list| {
                    list.iter()
                        .filter_map(|entry| {
                            let name = entry.get("name")?.as_str()?.to_string();
                            let value = entry.get("value").cloned().unwrap_or(Value::Null);
                            Some((name, value))
                        })
                        .collect()
                })
                .unwrap_or_default();
            debug!("Loaded {} server constants", constants.len());
            self.constants = Some(constants);
        }
        Ok(self.constants.get_or_insert_with(HashMap::new))
    }

    /// Ascending direction as the server defines it, `"Asc"` if unknown.
    async fn ascending(&mut self, column: &str) -> Result<SortOrder, ApiError> {
        let direction = self
            .constants()
            .await?
            .get(ASC_CONSTANT)
            .cloned()
            .unwrap_or_else(|| json!("Asc"));
        Ok(SortOrder::with_direction(column, direction))
    }

    async fn call(&mut self, method: &str, params: Value) -> Result<Value, ApiError> {
        self.session.send_request(method, Some(params)).await
    }

    async fn list<T: DeserializeOwned>(
        &mut self,
        method: &str,
        params: Value,
    ) -> Result<ListPage<T>, ApiError> {
        let result = self.call(method, params).await?;
        decode(method, result)
    }

    pub async fn domains(&mut self, fields: &[&str]) -> Result<Vec<Domain>, ApiError> {
        let params = json!({ "query": Query::fields(fields) });
        Ok(self.list("Domains.get", params).await?.list)
    }

    /// Users of a domain ordered by login name.
    pub async fn users(
        &mut self,
        fields: &[&str],
        domain_id: &str,
        conditions: Vec<Condition>,
    ) -> Result<Vec<User>, ApiError> {
        let order = self.ascending("loginName").await?;
        let query = Query::fields(fields).order_by(order).conditions(conditions);
        let params = json!({ "query": query, "domainId": domain_id });
        Ok(self.list("Users.get", params).await?.list)
    }

    /// The `limit` users of a domain with the largest mailboxes.
    pub async fn top_users_by_usage(
        &mut self,
        domain_id: &str,
        limit: u64,
    ) -> Result<ListPage<User>, ApiError> {
        let query = Query::fields(&["loginName", "fullName", "consumedSize"])
            .order_by(SortOrder::new("consumedSize", SortDirection::Desc))
            .page(0, limit);
        let params = json!({ "query": query, "domainId": domain_id });
        self.list("Users.get", params).await
    }

    /// Login name of the user with id `user_id`.
    pub async fn user_login_by_id(
        &mut self,
        user_id: &str,
        domain_id: &str,
    ) -> Result<Option<String>, ApiError> {
        let users = self.users(&["id", "loginName"], domain_id, Vec::new()).await?;
        Ok(users
            .into_iter()
            .find(|user| user.id.as_deref() == Some(user_id))
            .map(|user| user.login_name))
    }

    pub async fn groups(
        &mut self,
        fields: &[&str],
        domain_id: &str,
        conditions: Vec<Condition>,
    ) -> Result<Vec<Value>, ApiError> {
        self.named_list("Groups.get", fields, domain_id, conditions, None)
            .await
    }

    pub async fn create_group(&mut self, params: Value) -> Result<Value, ApiError> {
        let result = self.call("Groups.create", params).await?;
        Ok(result.get("result").cloned().unwrap_or(Value::Null))
    }

    pub async fn add_members_to_group(
        &mut self,
        group_id: &str,
        user_ids: &[&str],
    ) -> Result<(), ApiError> {
        let params = json!({ "userList": user_ids, "groupId": group_id });
        self.call("Groups.addMemberList", params).await?;
        Ok(())
    }

    pub async fn mailing_lists(
        &mut self,
        fields: &[&str],
        domain_id: &str,
        conditions: Vec<Condition>,
    ) -> Result<Vec<Value>, ApiError> {
        self.named_list("MailingLists.get", fields, domain_id, conditions, None)
            .await
    }

    pub async fn mailing_list_users(
        &mut self,
        fields: &[&str],
        mailing_list_id: &str,
    ) -> Result<Vec<Value>, ApiError> {
        let params = json!({ "query": Query::fields(fields), "mlId": mailing_list_id });
        Ok(self
            .list::<Value>("MailingLists.getMlUserList", params)
            .await?
            .list)
    }

    pub async fn resources(
        &mut self,
        fields: &[&str],
        domain_id: &str,
        conditions: Vec<Condition>,
    ) -> Result<Vec<Value>, ApiError> {
        self.named_list("Resources.get", fields, domain_id, conditions, None)
            .await
    }

    /// Aliases of a domain; conditions are combined with `Or`.
    pub async fn aliases(
        &mut self,
        fields: &[&str],
        domain_id: &str,
        conditions: Vec<Condition>,
    ) -> Result<Vec<Value>, ApiError> {
        self.named_list("Aliases.get", fields, domain_id, conditions, Some("Or"))
            .await
    }

    async fn named_list(
        &mut self,
        method: &str,
        fields: &[&str],
        domain_id: &str,
        conditions: Vec<Condition>,
        combining: Option<&str>,
    ) -> Result<Vec<Value>, ApiError> {
        let order = self.ascending("name").await?;
        let mut query = Query::fields(fields).order_by(order).conditions(conditions);
        if let Some(combining) = combining {
            query = query.combining(combining);
        }
        let params = json!({ "query": query, "domainId": domain_id });
        Ok(self.list::<Value>(method, params).await?.list)
    }

    pub async fn services(&mut self) -> Result<Value, ApiError> {
        let result = self.session.send_request("Services.get", None).await?;
        Ok(result.get("services").cloned().unwrap_or(Value::Null))
    }

    pub async fn statistics(&mut self) -> Result<Value, ApiError> {
        let result = self.session.send_request("Statistics.get", None).await?;
        Ok(result.get("statistics").cloned().unwrap_or(Value::Null))
    }

    pub async fn create_alias(
        &mut self,
        domain_id: &str,
        alias: &str,
        email: &str,
        description: &str,
    ) -> Result<Value, ApiError> {
        let params = json!({
            "aliases": [{
                "name": alias,
                "domainId": domain_id,
                "deliverTo": email,
                "description": description,
                "deliverToSelect": "TypeEmailAddress",
            }]
        });
        self.call("Aliases.create", params).await
    }

    pub async fn create_user(
        &mut self,
        domain_id: &str,
        login_name: &str,
        password: &str,
    ) -> Result<Value, ApiError> {
        let params = json!({
            "users": [{
                "loginName": login_name,
                "password": password,
                "domainId": domain_id,
                "isEnabled": true,
            }]
        });
        self.call("Users.create", params).await
    }

    pub async fn create_domain(&mut self, name: &str) -> Result<Value, ApiError> {
        let params = json!({ "domains": [{ "name": name }] });
        self.call("Domains.create", params).await
    }

    /// Entries of the IP address groups matching `name`.
    pub async fn ip_group_list(&mut self, name: Option<&str>) -> Result<Vec<Value>, ApiError> {
        let query = Query::default()
            .conditions(vec![Condition::new("name", "Like", name.unwrap_or_default())])
            .order_by(SortOrder::new("item", SortDirection::Asc));
        let params = json!({ "query": query });
        Ok(self
            .list::<Value>("IpAddressGroups.get", params)
            .await?
            .list)
    }

    pub async fn add_host_to_ip_group(
        &mut self,
        group: &str,
        host: &str,
        description: Option<&str>,
    ) -> Result<Value, ApiError> {
        let description = match description.filter(|d| !d.is_empty()) {
            Some(description) => description.to_string(),
            None => format!(
                "Automatically added on {}",
                chrono::Local::now().to_rfc2822()
            ),
        };
        let params = json!({
            "groups": [{
                "groupId": "",
                "groupName": group,
                "host": host,
                "type": "Host",
                "description": description,
                "enabled": true,
            }]
        });
        self.call("IpAddressGroups.create", params).await
    }

    /// Remove `host` from `group`. Returns `Ok(None)` when no such entry
    /// exists.
    pub async fn remove_host_from_ip_group(
        &mut self,
        group: &str,
        host: &str,
    ) -> Result<Option<Value>, ApiError> {
        let entries = self.ip_group_list(None).await?;
        let host_id = entries
            .iter()
            .rev()
            .find(|entry| {
                entry.get("groupName").and_then(Value::as_str) == Some(group)
                    && entry.get("host").and_then(Value::as_str) == Some(host)
            })
            .and_then(|entry| entry.get("id").cloned());

        match host_id {
            Some(id) => {
                let params = json!({ "groupIds": [id] });
                Ok(Some(self.call("IpAddressGroups.remove", params).await?))
            }
            None => Ok(None),
        }
    }
}

fn decode<T: DeserializeOwned>(method: &str, result: Value) -> Result<T, ApiError> {
    serde_json::from_value(result)
        .map_err(|e| ApiError::protocol(format!("Unexpected {} result: {}", method, e)))
}

/// Random password of lowercase letters and digits.
pub fn random_password(length: usize) -> String {
    const CHARACTERS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| CHARACTERS[rng.gen_range(0..CHARACTERS.len())] as char)
        .collect()
}
