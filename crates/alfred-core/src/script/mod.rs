//! User function files.
//!
//! A script is a JavaScript source with up to three well-known entry
//! points: `setup()` (startup KV seeding), `updateHelpers(helpers)`
//! (pre-substitution) and `alfred(mock, helpers, req, res)` (post-delay
//! response shaping). Which entry points exist is probed once at load by
//! evaluating the source in a pool VM.
//!
//! Host records cross into the scripts as JSON: the serde field names of
//! [`Helper`](crate::helper::Helper), [`Mock`](crate::mock::Mock),
//! [`Req`](crate::exchange::Req) and [`Res`](crate::exchange::Res) are
//! the property names scripts see.

use rquickjs::{Ctx, Function};
use std::path::Path;

use crate::exchange::{Req, Res};
use crate::helper::Helper;
use crate::mock::Mock;
use crate::{files, Error, Result};

mod pool;
mod vm;

pub use pool::{VmPool, VmPoolConfig, DEFAULT_CLEANUP_PERIOD, DEFAULT_MAX_SIZE, DEFAULT_MIN_SIZE};
pub use vm::ScriptVm;

use vm::js_error_message;

pub const FUNC_SETUP: &str = "setup";
pub const FUNC_ALFRED: &str = "alfred";
pub const FUNC_UPDATE_HELPERS: &str = "updateHelpers";

#[derive(Debug, Clone)]
pub struct Script {
    pub file_name: String,
    pub source: String,
    pub has_setup: bool,
    pub has_alfred: bool,
    pub has_update_helpers: bool,
}

impl Script {
    /// Build a script, probing for its entry points. Probe failures (a
    /// source that does not evaluate) propagate to the loader.
    pub async fn create(file_name: String, source: String, pool: &VmPool) -> Result<Self> {
        let vm = pool.acquire().await?;
        let probed = vm.with(|ctx| -> Result<(bool, bool, bool)> {
            eval_source(&ctx, &source, &file_name)?;
            Ok((
                function_exists(&ctx, &file_name, FUNC_SETUP)?,
                function_exists(&ctx, &file_name, FUNC_ALFRED)?,
                function_exists(&ctx, &file_name, FUNC_UPDATE_HELPERS)?,
            ))
        });
        pool.release(vm);

        let (has_setup, has_alfred, has_update_helpers) = probed?;
        Ok(Self {
            file_name,
            source,
            has_setup,
            has_alfred,
            has_update_helpers,
        })
    }

    /// Run `setup()`. Called once per script at startup.
    pub async fn setup(&self, pool: &VmPool) -> Result<()> {
        if !self.has_setup {
            return Err(Error::ScriptMissing {
                file: self.file_name.clone(),
                function: FUNC_SETUP.to_string(),
            });
        }

        let vm = pool.acquire().await?;
        let result = vm.with(|ctx| -> Result<()> {
            eval_source(&ctx, &self.source, &self.file_name)?;
            let setup: Function = self.global_function(&ctx, FUNC_SETUP)?;
            let _: rquickjs::Value = setup
                .call(())
                .map_err(|e| Error::script(&self.file_name, js_error_message(&ctx, &e)))?;
            Ok(())
        });
        pool.release(vm);
        result
    }

    /// Run `updateHelpers(helpers)` and return the script's helper list.
    pub async fn update_helpers(
        &self,
        pool: &VmPool,
        helpers: Vec<Helper>,
    ) -> Result<Vec<Helper>> {
        if !self.has_update_helpers {
            return Err(Error::ScriptMissing {
                file: self.file_name.clone(),
                function: FUNC_UPDATE_HELPERS.to_string(),
            });
        }

        let vm = pool.acquire().await?;
        let result = vm.with(|ctx| -> Result<Vec<Helper>> {
            eval_source(&ctx, &self.source, &self.file_name)?;
            let update: Function = self.global_function(&ctx, FUNC_UPDATE_HELPERS)?;

            let arg = self.to_js(&ctx, &helpers)?;
            let returned: rquickjs::Value = update
                .call((arg,))
                .map_err(|e| Error::script(&self.file_name, js_error_message(&ctx, &e)))?;
            self.from_js(&ctx, returned, FUNC_UPDATE_HELPERS)
        });
        pool.release(vm);
        result
    }

    /// Run `alfred(mock, helpers, req, res)` and return the response the
    /// script shaped.
    pub async fn alfred(
        &self,
        pool: &VmPool,
        mock: &Mock,
        helpers: &[Helper],
        req: &Req,
        res: &Res,
    ) -> Result<Res> {
        if !self.has_alfred {
            return Err(Error::ScriptMissing {
                file: self.file_name.clone(),
                function: FUNC_ALFRED.to_string(),
            });
        }

        let vm = pool.acquire().await?;
        let result = vm.with(|ctx| -> Result<Res> {
            eval_source(&ctx, &self.source, &self.file_name)?;
            let alfred: Function = self.global_function(&ctx, FUNC_ALFRED)?;

            let mock_arg = self.to_js(&ctx, mock)?;
            let helpers_arg = self.to_js(&ctx, &helpers)?;
            let req_arg = self.to_js(&ctx, req)?;
            let res_arg = self.to_js(&ctx, res)?;

            let returned: rquickjs::Value = alfred
                .call((mock_arg, helpers_arg, req_arg, res_arg))
                .map_err(|e| Error::script(&self.file_name, js_error_message(&ctx, &e)))?;
            self.from_js(&ctx, returned, FUNC_ALFRED)
        });
        pool.release(vm);
        result
    }

    fn global_function<'js>(&self, ctx: &Ctx<'js>, name: &str) -> Result<Function<'js>> {
        ctx.globals()
            .get(name)
            .map_err(|e| Error::script(&self.file_name, js_error_message(ctx, &e)))
    }

    fn to_js<'js, T: serde::Serialize>(
        &self,
        ctx: &Ctx<'js>,
        value: &T,
    ) -> Result<rquickjs::Value<'js>> {
        let json = serde_json::to_string(value)?;
        ctx.json_parse(json)
            .map_err(|e| Error::script(&self.file_name, js_error_message(ctx, &e)))
    }

    fn from_js<'js, T: serde::de::DeserializeOwned>(
        &self,
        ctx: &Ctx<'js>,
        value: rquickjs::Value<'js>,
        function: &str,
    ) -> Result<T> {
        let json = ctx
            .json_stringify(value)
            .map_err(|e| Error::script(&self.file_name, js_error_message(ctx, &e)))?
            .ok_or_else(|| {
                Error::script(&self.file_name, format!("{function} returned undefined"))
            })?;
        let text = json
            .to_string()
            .map_err(|e| Error::script(&self.file_name, e.to_string()))?;
        serde_json::from_str(&text)
            .map_err(|e| Error::script(&self.file_name, format!("{function} returned an unexpected shape: {e}")))
    }
}

fn eval_source(ctx: &Ctx<'_>, source: &str, file_name: &str) -> Result<()> {
    let evaluated: std::result::Result<rquickjs::Value, _> = ctx.eval(source);
    if let Err(e) = evaluated {
        return Err(Error::script(file_name, js_error_message(ctx, &e)));
    }
    Ok(())
}

fn function_exists(ctx: &Ctx<'_>, file_name: &str, name: &str) -> Result<bool> {
    ctx.eval(format!("typeof {name} === 'function'"))
        .map_err(|e| Error::script(file_name, js_error_message(ctx, &e)))
}

/// The scripts loaded at startup.
#[derive(Debug, Clone, Default)]
pub struct ScriptCollection {
    scripts: Vec<Script>,
}

impl ScriptCollection {
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Script> {
        self.scripts.iter()
    }

    pub fn get(&self, file_name: &str) -> Result<&Script> {
        self.scripts
            .iter()
            .find(|script| script.file_name == file_name)
            .ok_or_else(|| Error::script(file_name, "no function file with this name"))
    }
}

/// Load every `*.js` directly inside the functions directory.
pub async fn create_script_collection_from_folder(
    dir: &Path,
    pool: &VmPool,
) -> Result<ScriptCollection> {
    let mut scripts = Vec::new();
    for path in files::find_files(dir, "js")? {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let source = std::fs::read_to_string(&path)?;
        scripts.push(Script::create(file_name, source, pool).await?);
    }
    Ok(ScriptCollection { scripts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::HelperKind;
    use std::sync::Arc;

    fn test_pool() -> Arc<VmPool> {
        VmPool::new(VmPoolConfig {
            min_size: 1,
            max_size: 4,
            cleanup_period: std::time::Duration::from_secs(3600),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn probes_entry_points() {
        let pool = test_pool();
        let script = Script::create(
            "probe.js".to_string(),
            "function setup() {}\nfunction alfred(m, h, req, res) { return res; }".to_string(),
            &pool,
        )
        .await
        .unwrap();

        assert!(script.has_setup);
        assert!(script.has_alfred);
        assert!(!script.has_update_helpers);
    }

    #[tokio::test]
    async fn broken_source_fails_the_probe() {
        let pool = test_pool();
        let err = Script::create("broken.js".to_string(), "function (".to_string(), &pool)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Script { .. }));
    }

    #[tokio::test]
    async fn missing_entry_point_is_refused() {
        let pool = test_pool();
        let script = Script::create("empty.js".to_string(), "var x = 1;".to_string(), &pool)
            .await
            .unwrap();
        let err = script.setup(&pool).await.unwrap_err();
        assert!(matches!(err, Error::ScriptMissing { .. }));
    }

    #[tokio::test]
    async fn update_helpers_can_rewrite_values() {
        let pool = test_pool();
        let script = Script::create(
            "update.js".to_string(),
            r#"function updateHelpers(helpers) {
                for (var i = 0; i < helpers.length; i++) {
                    if (helpers[i].name === "who") { helpers[i].value = "from-script"; }
                }
                return helpers;
            }"#
            .to_string(),
            &pool,
        )
        .await
        .unwrap();

        let helpers = vec![Helper {
            kind: HelperKind::Request,
            string: "{{ alfred.req.who @name:'who' }}".to_string(),
            name: "who".to_string(),
            target: "who".to_string(),
            ..Helper::default()
        }];
        let updated = script.update_helpers(&pool, helpers).await.unwrap();
        assert_eq!(updated[0].value, "from-script");
        assert_eq!(updated[0].string, "{{ alfred.req.who @name:'who' }}");
    }

    #[tokio::test]
    async fn alfred_shapes_the_response() {
        let pool = test_pool();
        let script = Script::create(
            "upper.js".to_string(),
            "function alfred(m, h, req, res) { res.body = res.body.toUpperCase(); return res; }"
                .to_string(),
            &pool,
        )
        .await
        .unwrap();

        let mock = Mock::default();
        let req = Req::new("POST".to_string(), "/u".to_string(), String::new());
        let res = Res {
            status: 200,
            body: "hello".to_string(),
            ..Res::default()
        };
        let shaped = script.alfred(&pool, &mock, &[], &req, &res).await.unwrap();
        assert_eq!(shaped.body, "HELLO");
        assert_eq!(shaped.status, 200);
    }

    #[tokio::test]
    async fn script_runtime_errors_carry_the_file_name() {
        let pool = test_pool();
        let script = Script::create(
            "boom.js".to_string(),
            r#"function alfred(m, h, req, res) { throw new Error("boom"); }"#.to_string(),
            &pool,
        )
        .await
        .unwrap();

        let err = script
            .alfred(&pool, &Mock::default(), &[], &Req::default(), &Res::default())
            .await
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("boom.js"));
        assert!(text.contains("boom"));
    }

    #[tokio::test]
    async fn setup_can_seed_the_kv_store() {
        let pool = test_pool();
        let script = Script::create(
            "seed.js".to_string(),
            r#"function setup() { dbSet("seeded-by-setup", "yes"); }"#.to_string(),
            &pool,
        )
        .await
        .unwrap();
        script.setup(&pool).await.unwrap();
        assert_eq!(
            crate::kv::global().get("seeded-by-setup").as_deref(),
            Some("yes")
        );
    }

    #[tokio::test]
    async fn collection_loads_scripts_from_folder() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.js"), "function setup() {}").unwrap();
        std::fs::write(dir.path().join("b.js"), "function alfred(m,h,q,s) { return s; }")
            .unwrap();

        let pool = test_pool();
        let collection = create_script_collection_from_folder(dir.path(), &pool)
            .await
            .unwrap();
        assert!(collection.get("a.js").unwrap().has_setup);
        assert!(collection.get("b.js").unwrap().has_alfred);
        assert!(collection.get("c.js").is_err());
    }
}
