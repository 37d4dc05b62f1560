//! Serverless API: table, function and HTTP front-end
//!
//! Order matters: the function reads the table's generated name from its
//! environment, and the api is bound to the function. A usage plan and key
//! are added only when `require_api_key` is set. The data and invoke grants
//! are declared by the pattern itself.

use serde_json::{Value, json};
use tessera_constructs::{Attribute, EnhancedTable, FunctionProps, ManagedFunction, TableProps};
use tessera_core::{
    Capability, Construct, ConstructError, ConstructId, ConstructState, GrantRequest, OptionMap,
    Pattern, ResourceKind, ResourceRef, ResourceSpec, Result, Stack,
};

/// Stage every api is deployed to
pub const DEFAULT_STAGE: &str = "prod";
pub const THROTTLE_RATE_LIMIT: u32 = 10;
pub const THROTTLE_BURST_LIMIT: u32 = 20;

#[derive(Debug, Clone)]
pub struct ServerlessApiProps {
    pub code_path: Option<String>,
    pub table_name: Option<String>,
    pub partition_key_name: String,
    pub sort_key: Option<Attribute>,
    /// Extra table options, applied on top of the table defaults
    pub table_options: OptionMap,
    pub handler: Option<String>,
    pub runtime: Option<String>,
    /// Defaults to `<id>-api`
    pub api_name: Option<String>,
    /// When false the api carries no CORS configuration
    pub enable_cors: bool,
    pub require_api_key: bool,
}

impl Default for ServerlessApiProps {
    fn default() -> Self {
        Self {
            code_path: None,
            table_name: None,
            partition_key_name: "id".to_string(),
            sort_key: None,
            table_options: OptionMap::new(),
            handler: None,
            runtime: None,
            api_name: None,
            enable_cors: true,
            require_api_key: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerlessApi {
    pattern: Pattern,
    table: EnhancedTable,
    function: ManagedFunction,
    api: ResourceRef,
    usage_plan: Option<ResourceRef>,
    api_key: Option<ResourceRef>,
}

impl ServerlessApi {
    pub fn new(
        stack: &mut Stack,
        parent: ConstructId,
        id: &str,
        props: ServerlessApiProps,
    ) -> Result<Self> {
        let Some(code_path) = props.code_path.filter(|p| !p.trim().is_empty()) else {
            return Err(ConstructError::MissingCodePath {
                construct: stack.path(parent).child(id).to_string(),
            });
        };

        let mut pattern = Pattern::declare(stack, parent, id, "serverless-api")?;

        let mut table_props = TableProps::new(Attribute::string(props.partition_key_name));
        table_props.table_name = props.table_name;
        table_props.sort_key = props.sort_key;
        table_props.extra = props.table_options;
        let table = EnhancedTable::new(stack, pattern.id(), "Table", table_props)?;
        pattern.adopt(&table);
        let table_name = table.table_name()?.to_string();

        let function_props = FunctionProps {
            handler: props.handler,
            runtime: props.runtime,
            ..FunctionProps::new(code_path)
        }
        .env("TABLE_NAME", table_name.as_str());
        let function = ManagedFunction::new(stack, pattern.id(), "Function", function_props)?;
        pattern.adopt(&function);
        let handler = function.function()?;

        pattern.composite_mut().grant(
            stack,
            GrantRequest::new(handler, table.table()?)
                .allow_all([Capability::Read, Capability::Write])
                .justify("handler reads and writes the table"),
        )?;

        let mut api_spec = ResourceSpec::new(ResourceKind::Api)
            .option("rest_api_name", props.api_name.unwrap_or_else(|| format!("{}-api", id)))
            .option("description", format!("API for {}", id))
            .reference("handler", handler)
            .option("api_key_required", props.require_api_key)
            .option("stage_name", DEFAULT_STAGE);
        if !props.enable_cors {
            api_spec = api_spec.option("cors", Value::Null);
        }
        let api = pattern.composite_mut().create(stack, "Api", api_spec)?;
        pattern.composite_mut().grant(
            stack,
            GrantRequest::new(api, handler)
                .allow(Capability::Invoke)
                .justify("api invokes the handler"),
        )?;
        pattern.composite_mut().advance(ConstructState::BaseCreated)?;

        let (usage_plan, api_key) = if props.require_api_key {
            let (plan, key) = attach_api_key(stack, &mut pattern, id, api)?;
            (Some(plan), Some(key))
        } else {
            (None, None)
        };

        let endpoint = stack.resource(api)?.output("url").unwrap_or_default().to_string();
        let composite = pattern.composite_mut();
        composite.expose_value("api_endpoint", endpoint);
        composite.expose_value("table_name", table_name);
        composite.expose_resource("api", api);
        composite.finish()?;

        Ok(Self {
            pattern,
            table,
            function,
            api,
            usage_plan,
            api_key,
        })
    }

    pub fn table(&self) -> &EnhancedTable {
        &self.table
    }

    pub fn function(&self) -> &ManagedFunction {
        &self.function
    }

    pub fn api(&self) -> ResourceRef {
        self.api
    }

    pub fn usage_plan(&self) -> Option<ResourceRef> {
        self.usage_plan
    }

    pub fn api_key(&self) -> Option<ResourceRef> {
        self.api_key
    }

    pub fn api_endpoint(&self) -> Result<&str> {
        self.pattern.composite().value_output("api_endpoint")
    }

    pub fn table_name(&self) -> Result<&str> {
        self.pattern.composite().value_output("table_name")
    }
}

fn attach_api_key(
    stack: &mut Stack,
    pattern: &mut Pattern,
    id: &str,
    api: ResourceRef,
) -> Result<(ResourceRef, ResourceRef)> {
    let stage = json!({ "api": stack.reference(api)?, "stage": DEFAULT_STAGE });
    let plan = pattern.composite_mut().create(
        stack,
        "UsagePlan",
        ResourceSpec::new(ResourceKind::UsagePlan)
            .option("plan_name", format!("{}-usage-plan", id))
            .option(
                "throttle",
                json!({ "rate_limit": THROTTLE_RATE_LIMIT, "burst_limit": THROTTLE_BURST_LIMIT }),
            )
            .option("api_stages", json!([stage]))
            .depends_on(api),
    )?;
    let key = pattern.composite_mut().create(
        stack,
        "ApiKey",
        ResourceSpec::new(ResourceKind::ApiKey).option("api_key_name", format!("{}-api-key", id)),
    )?;
    stack.append_reference(plan, "api_keys", key)?;
    Ok((plan, key))
}

impl Construct for ServerlessApi {
    fn composite(&self) -> &tessera_core::Composite {
        self.pattern.composite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_constructs::AttributeType;
    use tessera_core::Principal;

    #[test]
    fn test_missing_code_path() {
        let mut stack = Stack::new("S").unwrap();
        let root = stack.root();
        assert!(matches!(
            ServerlessApi::new(&mut stack, root, "Orders", ServerlessApiProps::default()),
            Err(ConstructError::MissingCodePath { construct }) if construct == "S/Orders"
        ));
        assert_eq!(stack.tree().len(), 1);
    }

    #[test]
    fn test_wiring() {
        let mut stack = Stack::new("S").unwrap();
        let root = stack.root();
        let props = ServerlessApiProps {
            code_path: Some("./api".to_string()),
            ..Default::default()
        };
        let api = ServerlessApi::new(&mut stack, root, "Orders", props).unwrap();

        let table = api.table().table().unwrap();
        let function = api.function().function().unwrap();
        let environment = stack.resource(function).unwrap().option("environment").unwrap().clone();
        assert_eq!(environment["TABLE_NAME"], json!(api.table_name().unwrap()));

        let edge = stack
            .grants()
            .edge_between(&Principal::Resource(function), table)
            .unwrap();
        assert!(edge.allows(Capability::Read) && edge.allows(Capability::Write));
        assert!(
            stack
                .grants()
                .edge_between(&Principal::Resource(api.api()), function)
                .unwrap()
                .allows(Capability::Invoke)
        );

        assert_eq!(api.composite().grants().len(), 2);
        for grant in api.composite().grants() {
            assert_eq!(stack.grants().get(*grant).unwrap().owner(), Some(api.id()));
        }

        let node = stack.resource(api.api()).unwrap();
        assert_eq!(node.name, "Orders-api");
        assert_eq!(
            node.option("cors"),
            Some(&json!({ "allow_origins": ["*"], "allow_methods": ["*"] }))
        );
        assert_eq!(node.option("handler"), Some(&json!({ "ref": "S/Orders/Function/Function" })));
        assert_eq!(api.api_endpoint().unwrap(), "${S/Orders/Api.url}");
    }

    #[test]
    fn test_api_key_plan() {
        let mut stack = Stack::new("S").unwrap();
        let root = stack.root();
        let props = ServerlessApiProps {
            code_path: Some("./api".to_string()),
            require_api_key: true,
            ..Default::default()
        };
        let api = ServerlessApi::new(&mut stack, root, "Orders", props).unwrap();

        let plan = stack.resource(api.usage_plan().unwrap()).unwrap();
        assert_eq!(plan.name, "Orders-usage-plan");
        assert_eq!(plan.option("throttle"), Some(&json!({ "rate_limit": 10, "burst_limit": 20 })));
        assert_eq!(plan.option("api_stages").unwrap()[0]["stage"], json!("prod"));
        assert_eq!(plan.option("api_keys"), Some(&json!([{ "ref": "S/Orders/ApiKey" }])));
        assert!(plan.depends_on.contains(&api.api_key().unwrap()));
        let node = stack.resource(api.api()).unwrap();
        assert_eq!(node.option("api_key_required"), Some(&json!(true)));
    }

    #[test]
    fn test_api_name_and_cors_disabled() {
        let mut stack = Stack::new("S").unwrap();
        let root = stack.root();
        let props = ServerlessApiProps {
            code_path: Some("./api".to_string()),
            api_name: Some("orders-public".to_string()),
            enable_cors: false,
            ..Default::default()
        };
        let api = ServerlessApi::new(&mut stack, root, "Orders", props).unwrap();

        let node = stack.resource(api.api()).unwrap();
        assert_eq!(node.name, "orders-public");
        assert_eq!(node.option("cors"), Some(&Value::Null));
        let manifest = stack.manifest().unwrap();
        let declared = manifest.resources.iter().find(|r| r.path == "S/Orders/Api").unwrap();
        assert_eq!(declared.options["cors"], Value::Null);
    }

    #[test]
    fn test_table_props_forwarded() {
        let mut stack = Stack::new("S").unwrap();
        let root = stack.root();
        let mut table_options = OptionMap::new();
        table_options.insert("point_in_time_recovery".to_string(), json!(false));
        let props = ServerlessApiProps {
            code_path: Some("./api".to_string()),
            partition_key_name: "customer".to_string(),
            sort_key: Some(Attribute::new("created_at", AttributeType::Number)),
            table_options,
            ..Default::default()
        };
        let api = ServerlessApi::new(&mut stack, root, "Orders", props).unwrap();

        let table = stack.resource(api.table().table().unwrap()).unwrap();
        assert_eq!(
            table.option("partition_key"),
            Some(&json!({ "name": "customer", "type": "string" }))
        );
        assert_eq!(
            table.option("sort_key"),
            Some(&json!({ "name": "created_at", "type": "number" }))
        );
        assert_eq!(table.option("point_in_time_recovery"), Some(&json!(false)));
    }
}
