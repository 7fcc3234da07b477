//! Document walks shared by the site downloaders.

use scraper::node::Element;
use scraper::{Html, Node, Selector};

static IMG_SELECTOR: std::sync::LazyLock<Selector> =
    std::sync::LazyLock::new(|| Selector::parse("img[src]").expect("Invalid selector"));

/// Visit every node of `doc` depth first, parents before children.
///
/// Stops at the first error returned by `visit`.
pub fn for_each_node<E, F>(doc: &Html, mut visit: F) -> Result<(), E>
where
    F: FnMut(&Node) -> Result<(), E>,
{
    for node in doc.tree.root().descendants() {
        visit(node.value())?;
    }
    Ok(())
}

/// Visit every `<a>` element that carries a non-empty `href`.
pub fn for_each_link<E, F>(doc: &Html, mut visit: F) -> Result<(), E>
where
    F: FnMut(&Element) -> Result<(), E>,
{
    for_each_node(doc, |node| match node {
        Node::Element(el) if is_link(el) => visit(el),
        _ => Ok(()),
    })
}

fn is_link(el: &Element) -> bool {
    el.name() == "a" && el.attr("href").is_some_and(|href| !href.is_empty())
}

/// `src` of every `<img>` in document order, duplicates included.
#[must_use]
pub fn embedded_image_urls(doc: &Html) -> Vec<String> {
    doc.select(&IMG_SELECTOR)
        .filter_map(|img| img.value().attr("src"))
        .map(str::to_string)
        .collect()
}
