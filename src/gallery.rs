use maud::{html, Markup, DOCTYPE};

/// Render a page showing the images with the given local filenames, in order.
///
/// Stands in for a remote album; the filenames are relative to the page.
#[must_use]
pub fn build_gallery(filenames: &[String]) -> Markup {
    html! {
        (DOCTYPE)
        html {
            body {
                @for filename in filenames {
                    img src=(filename) alt=(filename) style="background-size:100% 100%";
                }
            }
        }
    }
}
