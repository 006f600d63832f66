use crate::runtime::context::Context;
use crate::runtime::nid::Nid;
use crate::runtime::workitem::Workitem;
use anyhow::Result;
use serde_json::Value;

/// Expands `${f:field}`, `${field}` and `${v:variable}` references in an
/// attribute. Unknown references expand to the empty string.
pub async fn substitute(raw: &str, workitem: &Workitem, ctx: &Context, env: &Nid) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start + 2..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let reference = &rest[start + 2..start + 2 + len];

        let value = match reference.split_once(':') {
            Some(("v", name)) => ctx.lookup_variable(name, env).await?,
            Some(("f", name)) => workitem.field(name).cloned(),
            _ => workitem.field(reference).cloned(),
        };
        match value {
            Some(Value::String(s)) => out.push_str(&s),
            Some(Value::Null) | None => {}
            Some(other) => out.push_str(&other.to_string()),
        }

        rest = &rest[start + 3 + len..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutex::registry::MutexRegistry;
    use crate::runtime::storage::{InMemoryMutexStore, InMemoryStateStore};
    use serde_json::json;
    use std::sync::Arc;
    use uuid::Uuid;

    #[tokio::test]
    async fn expands_fields_and_variables() {
        let ctx = Context::new(
            Arc::new(InMemoryStateStore::new()),
            Arc::new(MutexRegistry::new(Arc::new(InMemoryMutexStore::new()))),
        );
        let env = Nid::root(Uuid::new_v4());
        ctx.set_variable("region", &env, json!("eu")).await.unwrap();
        let wi = Workitem::new().with_field("account", "a-17").with_field("shard", 3);

        let name = substitute("//lock-${f:account}-${shard}-${v:region}${missing}", &wi, &ctx, &env)
            .await
            .unwrap();
        assert_eq!(name, "//lock-a-17-3-eu");

        assert_eq!(substitute("plain", &wi, &ctx, &env).await.unwrap(), "plain");
        assert_eq!(substitute("open ${f:account", &wi, &ctx, &env).await.unwrap(), "open ${f:account");
    }
}
