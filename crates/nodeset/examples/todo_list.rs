//! Todo list example - selecting, mutating and wiring events on a small document

use dom::{DomArena, DomSerializer, Host};
use nodeset::{Callback, Engine, Response};
use serde_json::json;

const PAGE: &str = r#"
<form id="add">
  <input name="title" value="">
</form>
<ul id="todo">
  <li class="open">buy milk</li>
  <li class="open">write report</li>
</ul>
"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let arena = DomArena::from_markup(PAGE)?;
    let mut engine = Engine::new(arena);

    let list = engine.select("#todo")?;
    engine.bottom(&list, "call plumber")?;
    engine.top(&list, r#"<li class="urgent">pay rent</li>"#)?;
    println!("Items: {}", engine.inner_html(&list)?.unwrap_or_default());

    // Clicking an item marks it done; clicks on the list are counted
    let toggle = Callback::new(|engine: &mut Engine<DomArena>, event| {
        if let Some(item) = event.target {
            engine.host_mut().set_attribute(item, "class", "done")?;
        }
        Ok(Response::Continue)
    });
    let items = engine.find(&list, "li")?;
    engine.on(&items, "click", &toggle, None)?;

    let counter = Callback::new(|_: &mut Engine<DomArena>, event| {
        println!("List saw '{}' with data {:?}", event.kind, event.data);
        Ok(Response::StopPropagation)
    });
    engine.on(&list, "click", &counter, None)?;

    let first = engine.find(&list, "li:first-child")?;
    engine.fire(&first, "click", Some(json!({ "source": "example" })))?;

    // Submitting the form appends whatever the title field holds
    let add = engine.select("#add")?;
    let submit = Callback::new(|engine: &mut Engine<DomArena>, _event| {
        let field = engine.select(r#"input[name="title"]"#)?;
        let title = engine.attr(&field, "value")?.pop().unwrap_or_default();
        if !title.is_empty() {
            let list = engine.select("#todo")?;
            engine.bottom(&list, title.as_str())?;
        }
        Ok(Response::CancelDefault)
    });
    engine.on(&add, "submit", &submit, None)?;

    let field = engine.select(r#"input[name="title"]"#)?;
    engine.set_attr(&field, "value", "water plants")?;
    engine.fire(&add, "submit", None)?;

    let done = engine.select(".done")?;
    println!("Done: {}", done.len());

    engine.un(&items, "click", Some(&toggle))?;
    let arena = engine.into_host()?;
    let list = arena.get_element_by_id(arena.document(), "todo")?.unwrap_or(arena.root_id());
    println!("Final list: {}", DomSerializer::new().inner(&arena, list)?);

    Ok(())
}
