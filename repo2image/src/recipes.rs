//! Stack detection rules and the Dockerfile each one produces.
//!
//! The registry is scanned top to bottom and the first recipe whose markers
//! all exist wins. Any recipe whose markers are a superset of another's must
//! come first, otherwise the generic one shadows it. The last entry is the
//! fallback and is returned without checking its markers.

use log::debug;
use std::path::Path;

use crate::models::{Recipe, StackType};

const NEXTJS_DOCKERFILE: &str = r#"FROM node:18-alpine
WORKDIR /app
COPY package*.json ./
RUN npm install
COPY . .
RUN npm run build
EXPOSE 3000
CMD ["npm", "run", "start"]"#;

const REACT_DOCKERFILE: &str = r#"FROM node:18-alpine
WORKDIR /app
COPY package*.json ./
RUN npm install
COPY . .
RUN npm run build
EXPOSE 3000
CMD ["npm", "start"]"#;

const NODE_DOCKERFILE: &str = r#"FROM node:18-alpine
WORKDIR /app
COPY package*.json ./
RUN npm install
COPY . .
EXPOSE 3000
CMD ["npm", "start"]"#;

const FLASK_DOCKERFILE: &str = r#"FROM python:3.9-slim
WORKDIR /app
COPY requirements.txt .
RUN pip install --no-cache-dir -r requirements.txt
COPY . .
ENV FLASK_APP=app.py
ENV FLASK_ENV=production
EXPOSE 5000
CMD ["flask", "run", "--host=0.0.0.0"]"#;

const DJANGO_DOCKERFILE: &str = r#"FROM python:3.9-slim
WORKDIR /app
COPY requirements.txt .
RUN pip install --no-cache-dir -r requirements.txt
COPY . .
EXPOSE 8000
CMD ["python", "manage.py", "runserver", "0.0.0.0:8000"]"#;

const PYTHON_DOCKERFILE: &str = r#"FROM python:3.9-slim
WORKDIR /app
COPY requirements.txt .
RUN pip install --no-cache-dir -r requirements.txt
COPY . .
EXPOSE 8000
CMD ["python", "app.py"]"#;

const STATIC_DOCKERFILE: &str = r#"FROM nginx:alpine
COPY . /usr/share/nginx/html
EXPOSE 80
CMD ["nginx", "-g", "daemon off;"]"#;

pub static REGISTRY: [Recipe; 7] = [
    Recipe {
        stack_type: StackType::NextJs,
        markers: &["next.config.js"],
        template: NEXTJS_DOCKERFILE,
        default_port: 3000,
    },
    Recipe {
        stack_type: StackType::React,
        markers: &["package.json", "src/App.js"],
        template: REACT_DOCKERFILE,
        default_port: 3000,
    },
    Recipe {
        stack_type: StackType::Node,
        markers: &["package.json"],
        template: NODE_DOCKERFILE,
        default_port: 3000,
    },
    Recipe {
        stack_type: StackType::Flask,
        markers: &["requirements.txt", "app.py"],
        template: FLASK_DOCKERFILE,
        default_port: 5000,
    },
    Recipe {
        stack_type: StackType::Django,
        markers: &["requirements.txt", "manage.py"],
        template: DJANGO_DOCKERFILE,
        default_port: 8000,
    },
    Recipe {
        stack_type: StackType::Python,
        markers: &["requirements.txt"],
        template: PYTHON_DOCKERFILE,
        default_port: 8000,
    },
    Recipe {
        stack_type: StackType::Static,
        markers: &["index.html"],
        template: STATIC_DOCKERFILE,
        default_port: 80,
    },
];

impl Recipe {
    pub fn matches(&self, root: &Path) -> bool {
        self.markers.iter().all(|marker| root.join(marker).exists())
    }
}

/// Returns the first recipe in `registry` matching `root`, or the last entry
/// when nothing before it does.
pub fn detect_in<'a>(registry: &'a [Recipe], root: &Path) -> &'a Recipe {
    let (fallback, candidates) = registry
        .split_last()
        .expect("recipe registry must not be empty");

    let recipe = candidates
        .iter()
        .find(|recipe| recipe.matches(root))
        .unwrap_or(fallback);

    debug!("matched {} recipe for {:?}", recipe.stack_type, root);
    recipe
}

pub fn detect(root: &Path) -> &'static Recipe {
    detect_in(&REGISTRY, root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn workspace(files: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for file in files {
            let path = dir.path().join(file);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, "").unwrap();
        }
        dir
    }

    fn detected(files: &[&str]) -> (StackType, u16) {
        let dir = workspace(files);
        let recipe = detect(dir.path());
        (recipe.stack_type, recipe.default_port)
    }

    #[test]
    fn react_app() {
        assert_eq!(
            detected(&["package.json", "src/App.js"]),
            (StackType::React, 3000)
        );
    }

    #[test]
    fn static_site_is_the_fallback() {
        assert_eq!(detected(&["index.html"]), (StackType::Static, 80));
        assert_eq!(detected(&[]), (StackType::Static, 80));
        assert_eq!(detected(&["README.md", "main.go"]), (StackType::Static, 80));
    }

    #[test]
    fn specific_frameworks_win_over_generic_runtimes() {
        assert_eq!(
            detected(&["next.config.js", "package.json", "src/App.js"]).0,
            StackType::NextJs
        );
        assert_eq!(detected(&["package.json"]).0, StackType::Node);
        assert_eq!(
            detected(&["requirements.txt", "app.py"]),
            (StackType::Flask, 5000)
        );
        assert_eq!(
            detected(&["requirements.txt", "manage.py"]),
            (StackType::Django, 8000)
        );
        assert_eq!(detected(&["requirements.txt"]), (StackType::Python, 8000));
    }

    #[test]
    fn partial_marker_sets_do_not_match() {
        // src/App.js without package.json is not a react app
        assert_eq!(detected(&["src/App.js"]).0, StackType::Static);
        assert_eq!(detected(&["app.py", "manage.py"]).0, StackType::Static);
    }

    #[test]
    fn first_match_in_registry_order() {
        let dir = workspace(&["package.json", "src/App.js", "requirements.txt", "app.py"]);
        let recipe = detect(dir.path());
        let first = REGISTRY[..REGISTRY.len() - 1]
            .iter()
            .position(|r| r.matches(dir.path()))
            .unwrap();
        assert_eq!(recipe, &REGISTRY[first]);
        assert_eq!(recipe.stack_type, StackType::React);
    }

    #[test]
    fn supersets_precede_subsets() {
        for (i, earlier) in REGISTRY.iter().enumerate() {
            for later in &REGISTRY[i + 1..] {
                let shadows = earlier.markers.iter().all(|m| later.markers.contains(m));
                assert!(
                    !shadows,
                    "{} shadows {}",
                    earlier.stack_type, later.stack_type
                );
            }
        }
    }

    #[test]
    fn custom_registry_falls_back_to_last_entry() {
        let registry = [REGISTRY[2].clone(), REGISTRY[0].clone()];
        let dir = workspace(&["requirements.txt"]);
        assert_eq!(
            detect_in(&registry, dir.path()).stack_type,
            StackType::NextJs
        );
    }
}
