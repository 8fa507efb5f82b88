pub mod contacts;
pub mod core;
pub mod parser;
pub mod render;
pub mod resolve;
pub mod spatial;
pub mod state;

use crate::contacts::LogDispatcher;
use crate::core::errors::{Result, WidgetError};
use crate::core::types::{Coordinate, WidgetOptions};
use crate::parser::{GeodataSource, OverpassClient};
use crate::render::RenderPatch;
use crate::state::{spawn_refresh, AppState, CategoryUpdate};
use lazy_static::lazy_static;
use neon::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Runtime;

lazy_static! {
    static ref TOKIO_RUNTIME: Runtime = Runtime::new().expect("Failed to create Tokio runtime");
    static ref WIDGET_STORAGE: Mutex<HashMap<i32, Widget>> = Mutex::new(HashMap::new());
}

static NEXT_WIDGET_ID: AtomicI32 = AtomicI32::new(1);

#[derive(Clone)]
struct Widget {
    state: Arc<Mutex<AppState>>,
    source: Arc<dyn GeodataSource>,
}

impl Widget {
    fn state(&self) -> MutexGuard<'_, AppState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn widgets() -> MutexGuard<'static, HashMap<i32, Widget>> {
    WIDGET_STORAGE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

fn build_widget(options_json: &str) -> Result<Widget> {
    let options = if options_json.trim().is_empty() {
        WidgetOptions::default()
    } else {
        WidgetOptions::from_json(options_json)?
    };
    let source = OverpassClient::new(&options.overpass)?;
    let state = AppState::new(options)?;
    Ok(Widget {
        state: Arc::new(Mutex::new(state)),
        source: Arc::new(source),
    })
}

fn lookup_widget<'a>(cx: &mut FunctionContext<'a>, widget_id: i32) -> NeonResult<Widget> {
    match widgets().get(&widget_id) {
        Some(widget) => Ok(widget.clone()),
        None => cx.throw_error(WidgetError::WidgetNotFound(widget_id).to_string()),
    }
}

/// Kicks off a refresh whose per-category results are delivered to `callback`
/// as `(error | null, category, patchJson)`. Returns the patch for anything
/// rendered synchronously.
fn start_refresh<'a>(
    cx: &mut FunctionContext<'a>,
    widget: &Widget,
    callback: Handle<'a, JsFunction>,
) -> RenderPatch {
    let callback = Arc::new(callback.root(cx));
    let channel = cx.channel();

    let sink: Arc<dyn Fn(CategoryUpdate) + Send + Sync> = Arc::new(move |update| {
        let callback = callback.clone();
        channel.send(move |mut cx| {
            let callback = callback.to_inner(&mut cx);
            let this = cx.undefined();
            let error: Handle<JsValue> = match update.error {
                Some(message) => cx.string(message).upcast(),
                None => cx.null().upcast(),
            };
            let category: Handle<JsValue> = cx.string(update.category.key()).upcast();
            let patch: Handle<JsValue> = cx.string(update.patch.to_json()).upcast();
            callback.call(&mut cx, this, vec![error, category, patch])?;
            Ok(())
        });
    });

    match spawn_refresh(
        TOKIO_RUNTIME.handle(),
        widget.state.clone(),
        widget.source.clone(),
        sink,
    ) {
        Ok(handles) => {
            log::debug!("Started {} category fetches", handles.len());
            RenderPatch::default()
        }
        Err(e) => {
            log::info!("Refresh skipped: {}", e);
            widget.state().take_patch()
        }
    }
}

fn create_widget(mut cx: FunctionContext) -> JsResult<JsNumber> {
    let options_json = match cx.argument_opt(0) {
        Some(value) => value.downcast_or_throw::<JsString, _>(&mut cx)?.value(&mut cx),
        None => String::new(),
    };

    let widget = match build_widget(&options_json) {
        Ok(widget) => widget,
        Err(e) => return cx.throw_error(format!("Failed to create widget: {}", e)),
    };

    let widget_id = NEXT_WIDGET_ID.fetch_add(1, Ordering::Relaxed);
    widgets().insert(widget_id, widget);
    log::info!("Created widget {}", widget_id);
    Ok(cx.number(widget_id as f64))
}

fn destroy_widget(mut cx: FunctionContext) -> JsResult<JsBoolean> {
    let widget_id = cx.argument::<JsNumber>(0)?.value(&mut cx) as i32;
    let removed = widgets().remove(&widget_id).is_some();
    Ok(cx.boolean(removed))
}

fn set_location(mut cx: FunctionContext) -> JsResult<JsString> {
    let widget_id = cx.argument::<JsNumber>(0)?.value(&mut cx) as i32;
    let lat = cx.argument::<JsNumber>(1)?.value(&mut cx);
    let lon = cx.argument::<JsNumber>(2)?.value(&mut cx);
    let callback = cx.argument::<JsFunction>(3)?;

    let widget = lookup_widget(&mut cx, widget_id)?;
    let coordinate = match Coordinate::new(lat, lon) {
        Ok(coordinate) => coordinate,
        Err(e) => return cx.throw_error(e.to_string()),
    };

    let mut patch = widget.state().set_location(coordinate);
    patch
        .ops
        .extend(start_refresh(&mut cx, &widget, callback).ops);
    Ok(cx.string(patch.to_json()))
}

fn report_location_error(mut cx: FunctionContext) -> JsResult<JsString> {
    let widget_id = cx.argument::<JsNumber>(0)?.value(&mut cx) as i32;
    let reason = cx.argument::<JsString>(1)?.value(&mut cx);

    let widget = lookup_widget(&mut cx, widget_id)?;
    let patch = widget.state().location_failed(&reason);
    Ok(cx.string(patch.to_json()))
}

fn set_radius(mut cx: FunctionContext) -> JsResult<JsString> {
    let widget_id = cx.argument::<JsNumber>(0)?.value(&mut cx) as i32;
    let meters = cx.argument::<JsNumber>(1)?.value(&mut cx);
    let callback = cx.argument::<JsFunction>(2)?;

    if !meters.is_finite() || meters < 0.0 {
        return cx.throw_error(format!("Invalid radius: {}", meters));
    }

    let widget = lookup_widget(&mut cx, widget_id)?;
    let mut patch = widget.state().set_radius(meters.round() as u32);
    patch
        .ops
        .extend(start_refresh(&mut cx, &widget, callback).ops);
    Ok(cx.string(patch.to_json()))
}

fn refresh(mut cx: FunctionContext) -> JsResult<JsString> {
    let widget_id = cx.argument::<JsNumber>(0)?.value(&mut cx) as i32;
    let callback = cx.argument::<JsFunction>(1)?;

    let widget = lookup_widget(&mut cx, widget_id)?;
    let patch = start_refresh(&mut cx, &widget, callback);
    Ok(cx.string(patch.to_json()))
}

fn add_contact(mut cx: FunctionContext) -> JsResult<JsBoolean> {
    let widget_id = cx.argument::<JsNumber>(0)?.value(&mut cx) as i32;
    let name = cx.argument::<JsString>(1)?.value(&mut cx);
    let phone = cx.argument::<JsString>(2)?.value(&mut cx);

    let widget = lookup_widget(&mut cx, widget_id)?;
    let added = widget.state().add_contact(&name, &phone);
    Ok(cx.boolean(added))
}

fn delete_contact(mut cx: FunctionContext) -> JsResult<JsBoolean> {
    let widget_id = cx.argument::<JsNumber>(0)?.value(&mut cx) as i32;
    let index = cx.argument::<JsNumber>(1)?.value(&mut cx);

    let widget = lookup_widget(&mut cx, widget_id)?;
    if !index.is_finite() || index < 0.0 {
        return Ok(cx.boolean(false));
    }
    let removed = widget.state().delete_contact(index as usize);
    Ok(cx.boolean(removed))
}

fn list_contacts(mut cx: FunctionContext) -> JsResult<JsString> {
    let widget_id = cx.argument::<JsNumber>(0)?.value(&mut cx) as i32;

    let widget = lookup_widget(&mut cx, widget_id)?;
    let json = serde_json::to_string(widget.state().contacts());
    match json {
        Ok(json) => Ok(cx.string(json)),
        Err(e) => cx.throw_error(e.to_string()),
    }
}

fn send_sos(mut cx: FunctionContext) -> JsResult<JsString> {
    let widget_id = cx.argument::<JsNumber>(0)?.value(&mut cx) as i32;

    let widget = lookup_widget(&mut cx, widget_id)?;
    let outcome = widget.state().send_sos(&LogDispatcher);

    let mut value = match serde_json::to_value(&outcome) {
        Ok(value) => value,
        Err(e) => return cx.throw_error(e.to_string()),
    };
    value["userMessage"] = serde_json::Value::String(outcome.user_message());
    Ok(cx.string(value.to_string()))
}

fn external_map_url(mut cx: FunctionContext) -> JsResult<JsValue> {
    let widget_id = cx.argument::<JsNumber>(0)?.value(&mut cx) as i32;

    let widget = lookup_widget(&mut cx, widget_id)?;
    let url = widget.state().external_map_url();
    match url {
        Some(url) => Ok(cx.string(url).upcast()),
        None => Ok(cx.null().upcast()),
    }
}

#[neon::main]
fn main(mut cx: ModuleContext) -> NeonResult<()> {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();

    cx.export_function("createWidget", create_widget)?;
    cx.export_function("destroyWidget", destroy_widget)?;
    cx.export_function("setLocation", set_location)?;
    cx.export_function("reportLocationError", report_location_error)?;
    cx.export_function("setRadius", set_radius)?;
    cx.export_function("refresh", refresh)?;

    cx.export_function("addContact", add_contact)?;
    cx.export_function("deleteContact", delete_contact)?;
    cx.export_function("listContacts", list_contacts)?;
    cx.export_function("sendSos", send_sos)?;
    cx.export_function("externalMapUrl", external_map_url)?;

    Ok(())
}
